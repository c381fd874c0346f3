use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

struct FakeResolver {
    known: Vec<&'static str>,
    slow: Vec<&'static str>,
    loads: AtomicUsize,
}

impl FakeResolver {
    fn new(known: &[&'static str], slow: &[&'static str]) -> Self {
        Self {
            known: known.to_vec(),
            slow: slow.to_vec(),
            loads: AtomicUsize::new(0),
        }
    }
}

impl FontResolver for FakeResolver {
    fn load(&self, family: &str) -> Option<ResolvedFont> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.slow.contains(&family) {
            std::thread::sleep(Duration::from_millis(500));
        }
        self.known.contains(&family).then(|| ResolvedFont {
            family: family.to_owned(),
            bytes: Arc::new(vec![0u8; 4]),
            index: 0,
        })
    }

    fn differs_from_fallback(&self, family: &str) -> bool {
        self.known.contains(&family) && family != "sans-serif"
    }
}

fn loader(known: &[&'static str], slow: &[&'static str], timeout_ms: u64) -> FontLoader {
    FontLoader::with_timeout(
        Arc::new(FakeResolver::new(known, slow)),
        Duration::from_millis(timeout_ms),
    )
}

#[test]
fn resolves_known_family_and_normalizes_name() {
    let l = loader(&["Space Grotesk"], &[], 1_000);
    let font = l.resolve("  Space   Grotesk ", Duration::from_secs(1)).unwrap();
    assert_eq!(font.family, "Space Grotesk");
    assert!(l.resolve("Nope", Duration::from_secs(1)).is_none());
    assert!(l.resolve("   ", Duration::from_secs(1)).is_none());
}

#[test]
fn each_family_is_loaded_once() {
    let resolver = Arc::new(FakeResolver::new(&["Inter"], &[]));
    let l = FontLoader::with_timeout(resolver.clone(), Duration::from_secs(1));
    for _ in 0..5 {
        assert!(l.resolve("Inter", Duration::from_secs(1)).is_some());
    }
    assert_eq!(resolver.loads.load(Ordering::SeqCst), 1);
}

#[test]
fn slow_family_times_out_and_stays_unusable() {
    let l = loader(&["Slow"], &["Slow"], 50);
    assert!(l.resolve("Slow", Duration::from_secs(5)).is_none());
    std::thread::sleep(Duration::from_millis(600));
    // The late result does not override the timeout verdict.
    assert!(l.resolve("Slow", Duration::from_secs(5)).is_none());
}

#[test]
fn zero_wait_does_not_burn_the_budget() {
    let l = loader(&["Slow"], &["Slow"], 2_000);
    assert!(l.resolve("Slow", Duration::ZERO).is_none());
    assert!(l.resolve("Slow", Duration::from_secs(2)).is_some());
}

#[test]
fn fallback_chain_is_walked_in_order() {
    let l = loader(&["Arial", "DejaVu Sans"], &[], 1_000);
    let font = l
        .resolve_with_fallback("Missing", FALLBACK_CHAIN, Duration::from_secs(1))
        .unwrap();
    assert_eq!(font.family, "Arial");
}

#[test]
fn verify_usable_keeps_order_and_drops_failures() {
    let l = loader(&["A", "C", "Slow"], &["Slow"], 100);
    let usable = l.verify_usable(&["C", "B", "Slow", "A"]);
    assert_eq!(usable, vec!["C".to_owned(), "A".to_owned()]);
}

#[test]
fn distinct_check_is_synchronous() {
    let l = loader(&["Inter"], &[], 1_000);
    assert!(l.is_distinct_from_fallback("Inter"));
    assert!(!l.is_distinct_from_fallback("Unknown"));
}

/// Tracks how many loads overlap and keeps a weak handle on every buffer it hands out.
#[derive(Default)]
struct RecordingResolver {
    running: AtomicUsize,
    peak: AtomicUsize,
    handed_out: std::sync::Mutex<Vec<(String, std::sync::Weak<Vec<u8>>)>>,
}

impl RecordingResolver {
    fn alive(&self, family: &str) -> bool {
        self.handed_out
            .lock()
            .unwrap()
            .iter()
            .any(|(f, w)| f == family && w.strong_count() > 0)
    }
}

impl FontResolver for RecordingResolver {
    fn load(&self, family: &str) -> Option<ResolvedFont> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(10));
        self.running.fetch_sub(1, Ordering::SeqCst);

        let bytes = Arc::new(vec![1u8; 64]);
        self.handed_out
            .lock()
            .unwrap()
            .push((family.to_owned(), Arc::downgrade(&bytes)));
        Some(ResolvedFont {
            family: family.to_owned(),
            bytes,
            index: 0,
        })
    }

    fn differs_from_fallback(&self, _family: &str) -> bool {
        true
    }
}

#[test]
fn many_families_load_on_a_bounded_pool() {
    let resolver = Arc::new(RecordingResolver::default());
    let l = FontLoader::with_timeout(resolver.clone(), Duration::from_secs(5));
    let families: Vec<String> = (0..40).map(|i| format!("Family {i}")).collect();

    let usable = l.verify_usable(&families);
    assert_eq!(usable, families);
    let peak = resolver.peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= LOAD_WORKERS, "peak concurrency {peak}");
}

#[test]
fn verification_does_not_pin_font_bytes() {
    let resolver = Arc::new(RecordingResolver::default());
    let l = FontLoader::with_timeout(resolver.clone(), Duration::from_secs(5));

    // Requested before verification, so it stays cached.
    let kept = l.resolve("Kept", Duration::from_secs(5)).unwrap();
    drop(kept);

    let usable = l.verify_usable(&["Kept", "Checked A", "Checked B"]);
    assert_eq!(usable.len(), 3);
    assert!(resolver.alive("Kept"));
    // Workers drop their handle on the cell just after publishing the result.
    let deadline = Instant::now() + Duration::from_secs(2);
    while (resolver.alive("Checked A") || resolver.alive("Checked B")) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!resolver.alive("Checked A"));
    assert!(!resolver.alive("Checked B"));

    // A later request loads it again.
    assert!(l.resolve("Checked A", Duration::from_secs(5)).is_some());
    assert!(resolver.alive("Checked A"));
}
