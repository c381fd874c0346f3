use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::fonts::pool::normalize_font_name;
use crate::fonts::resolver::{FontResolver, ResolvedFont};

/// Default budget for one font to load before it is treated as unusable.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(2);

/// Loads running at once; further families queue for a free worker.
pub const LOAD_WORKERS: usize = 4;

/// Families tried, in order, when the requested one cannot be drawn.
pub const FALLBACK_CHAIN: &[&str] = &[
    "system-ui",
    "Segoe UI",
    "Roboto",
    "Helvetica",
    "Arial",
    "DejaVu Sans",
    "Liberation Sans",
    "sans-serif",
];

#[derive(Clone, Debug)]
enum LoadState {
    Pending,
    Ready(ResolvedFont),
    Unusable,
}

struct LoadCell {
    state: Mutex<LoadState>,
    done: Condvar,
    started: Instant,
}

impl LoadCell {
    fn finish(&self, result: Option<ResolvedFont>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        // A terminal state (including a timeout verdict) is never overwritten.
        if matches!(*state, LoadState::Pending) {
            *state = match result {
                Some(font) => LoadState::Ready(font),
                None => LoadState::Unusable,
            };
        }
        self.done.notify_all();
    }
}

/// Caching, timeout-bounded front for a [`FontResolver`].
///
/// Each family is loaded at most once, on a pool of [`LOAD_WORKERS`] threads. Callers choose
/// how long they are willing to wait right now (`wait`); independent of that, a family that has
/// not resolved within the loader's total budget (counted from the request, queueing included)
/// is marked unusable for good.
pub struct FontLoader {
    resolver: Arc<dyn FontResolver>,
    timeout: Duration,
    cells: Mutex<HashMap<String, Arc<LoadCell>>>,
    /// `None` if the pool could not be built; loads then go to rayon's global pool.
    workers: Option<rayon::ThreadPool>,
}

impl FontLoader {
    /// Loader with the [`DEFAULT_LOAD_TIMEOUT`] budget.
    pub fn new(resolver: Arc<dyn FontResolver>) -> Self {
        Self::with_timeout(resolver, DEFAULT_LOAD_TIMEOUT)
    }

    /// Loader whose fonts must resolve within `timeout` or be treated as unusable.
    pub fn with_timeout(resolver: Arc<dyn FontResolver>, timeout: Duration) -> Self {
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(LOAD_WORKERS)
            .thread_name(|i| format!("font-load-{i}"))
            .build();
        let workers = match workers {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!(error = %e, "failed to build font loader pool; using the global pool");
                None
            }
        };
        Self {
            resolver,
            timeout,
            cells: Mutex::new(HashMap::new()),
            workers,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start loading without waiting.
    pub fn prefetch<S: AsRef<str>>(&self, families: &[S]) {
        let mut cells = self.lock_cells();
        for family in families {
            let name = normalize_font_name(family.as_ref());
            if !name.is_empty() {
                let _ = self.start(&mut cells, &name);
            }
        }
    }

    /// Resolve `family`, waiting at most `wait` (and never past the load budget).
    pub fn resolve(&self, family: &str, wait: Duration) -> Option<ResolvedFont> {
        let family = normalize_font_name(family);
        if family.is_empty() {
            return None;
        }
        let cell = self.cell(&family);

        let state = cell.state.lock().unwrap_or_else(|e| e.into_inner());
        let budget_left = self.timeout.saturating_sub(cell.started.elapsed());
        let (mut state, _) = cell
            .done
            .wait_timeout_while(state, wait.min(budget_left), |s| {
                matches!(s, LoadState::Pending)
            })
            .unwrap_or_else(|e| e.into_inner());

        if matches!(*state, LoadState::Pending) && cell.started.elapsed() >= self.timeout {
            let timeout_ms = self.timeout.as_millis();
            tracing::warn!(family = %family, timeout_ms, "font load timed out; treating as unusable");
            *state = LoadState::Unusable;
        }

        match &*state {
            LoadState::Ready(font) => Some(font.clone()),
            LoadState::Pending | LoadState::Unusable => None,
        }
    }

    /// Resolve the requested family, falling back through `chain` in order.
    ///
    /// The requested family gets the full `wait`; fallbacks are only taken if already loaded
    /// or loadable within the same wait, so a slow fallback never stalls a frame twice.
    pub fn resolve_with_fallback<S: AsRef<str>>(
        &self,
        family: &str,
        chain: &[S],
        wait: Duration,
    ) -> Option<ResolvedFont> {
        if let Some(font) = self.resolve(family, wait) {
            return Some(font);
        }
        chain
            .iter()
            .find_map(|fallback| self.resolve(fallback.as_ref(), wait))
    }

    /// Quick synchronous check that never waits on loads.
    pub fn is_distinct_from_fallback(&self, family: &str) -> bool {
        self.resolver.differs_from_fallback(&normalize_font_name(family))
    }

    /// Check many families concurrently, each bounded by the load budget. Keeps input order.
    ///
    /// Fonts first loaded by this check are not kept in the cache; families already requested
    /// elsewhere and every unusable verdict stay cached.
    pub fn verify_usable<S: AsRef<str> + Sync>(&self, families: &[S]) -> Vec<String> {
        let mut fresh = Vec::new();
        {
            let mut cells = self.lock_cells();
            for family in families {
                let name = normalize_font_name(family.as_ref());
                if !name.is_empty() && self.start(&mut cells, &name).1 {
                    fresh.push(name);
                }
            }
        }
        let checked: Vec<(String, bool)> = families
            .par_iter()
            .map(|f| {
                let name = normalize_font_name(f.as_ref());
                let ok = self.resolve(&name, self.timeout).is_some();
                (name, ok)
            })
            .collect();

        let mut usable = Vec::with_capacity(checked.len());
        for (name, ok) in checked {
            if ok {
                usable.push(name);
            } else {
                tracing::debug!(family = %name, "dropping unusable font");
            }
        }
        self.evict_loaded(&fresh);
        usable
    }

    fn lock_cells(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<LoadCell>>> {
        self.cells.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cell(&self, family: &str) -> Arc<LoadCell> {
        let mut cells = self.lock_cells();
        self.start(&mut cells, family).0
    }

    /// The family's cell, queueing its load if this is the first request. `true` when new.
    fn start(
        &self,
        cells: &mut HashMap<String, Arc<LoadCell>>,
        family: &str,
    ) -> (Arc<LoadCell>, bool) {
        if let Some(cell) = cells.get(family) {
            return (Arc::clone(cell), false);
        }

        let cell = Arc::new(LoadCell {
            state: Mutex::new(LoadState::Pending),
            done: Condvar::new(),
            started: Instant::now(),
        });
        cells.insert(family.to_owned(), Arc::clone(&cell));

        let resolver = Arc::clone(&self.resolver);
        let worker_cell = Arc::clone(&cell);
        let name = family.to_owned();
        let job = move || {
            let result = resolver.load(&name);
            worker_cell.finish(result);
        };
        match &self.workers {
            Some(pool) => pool.spawn(job),
            None => rayon::spawn(job),
        }
        (cell, true)
    }

    /// Forget loaded fonts among `families` so their bytes are not pinned by the cache.
    fn evict_loaded(&self, families: &[String]) {
        let mut cells = self.lock_cells();
        let mut evicted = 0usize;
        for family in families {
            let loaded = cells.get(family).is_some_and(|cell| {
                let state = cell.state.lock().unwrap_or_else(|e| e.into_inner());
                matches!(*state, LoadState::Ready(_))
            });
            if loaded {
                cells.remove(family);
                evicted += 1;
            }
        }
        if evicted > 0 {
            tracing::debug!(evicted, "released fonts loaded only for verification");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/fonts/loader.rs"]
mod tests;
