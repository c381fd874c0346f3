use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, Weak};

use usvg::fontdb;

use crate::foundation::error::{TypeCutError, TypeCutResult};

/// Raw font bytes ready for shaping and rasterization.
#[derive(Clone)]
pub struct ResolvedFont {
    /// Family name as requested by the caller.
    pub family: String,
    /// Whole font file, shared by every family name that resolves to the same face.
    pub bytes: Arc<Vec<u8>>,
    /// Face index inside a collection file.
    pub index: u32,
}

impl std::fmt::Debug for ResolvedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedFont")
            .field("family", &self.family)
            .field("bytes", &self.bytes.len())
            .field("index", &self.index)
            .finish()
    }
}

/// Host capability that turns a family name into glyph data.
pub trait FontResolver: Send + Sync {
    /// Load the family's glyph resource. May block on I/O; callers bound the wait.
    fn load(&self, family: &str) -> Option<ResolvedFont>;

    /// Quick, non-blocking check that `family` would render with something other than the
    /// generic fallback face.
    ///
    /// This is a heuristic: a family whose face is the fallback face itself (or metrically
    /// identical to it) reports `false` even though it is installed.
    fn differs_from_fallback(&self, family: &str) -> bool;
}

/// [`FontResolver`] backed by a `fontdb` database of system fonts, font directories and
/// individually installed files.
pub struct FontDbResolver {
    db: fontdb::Database,
    /// Lowercased file stem -> face, so installed files resolve by their file name too.
    aliases: HashMap<String, fontdb::ID>,
    /// Bytes handed out per face. Weak, so the data goes away with the last `ResolvedFont`.
    loaded: Mutex<HashMap<fontdb::ID, Weak<Vec<u8>>>>,
}

impl Default for FontDbResolver {
    fn default() -> Self {
        Self::empty()
    }
}

impl FontDbResolver {
    pub fn empty() -> Self {
        Self {
            db: fontdb::Database::new(),
            aliases: HashMap::new(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Database of the host's installed fonts.
    pub fn system() -> Self {
        let mut out = Self::empty();
        out.db.load_system_fonts();
        tracing::debug!(faces = out.db.len(), "loaded system fonts");
        out
    }

    pub fn face_count(&self) -> usize {
        self.db.len()
    }

    /// Add every font file found under `dir`. Unreadable files are skipped by `fontdb`.
    pub fn load_dir(&mut self, dir: &Path) {
        let before = self.db.len();
        self.db.load_fonts_dir(dir);
        self.index_new_faces(before);
        tracing::debug!(
            dir = %dir.display(),
            added = self.db.len() - before,
            "loaded font directory"
        );
    }

    /// Install one font file; it becomes reachable under its family names and its file stem.
    pub fn install_file(&mut self, path: &Path) -> TypeCutResult<()> {
        let before = self.db.len();
        self.db.load_font_file(path).map_err(|e| {
            TypeCutError::font(format!("failed to load font file '{}': {e}", path.display()))
        })?;
        if self.db.len() == before {
            return Err(TypeCutError::font(format!(
                "'{}' contains no usable font faces",
                path.display()
            )));
        }
        self.index_new_faces(before);
        Ok(())
    }

    /// Family names of every face, sorted and de-duplicated.
    pub fn families(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .db
            .faces()
            .filter_map(|f| f.families.first().map(|(n, _)| n.clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn index_new_faces(&mut self, before: usize) {
        let new_faces: Vec<(fontdb::ID, Option<String>)> = self
            .db
            .faces()
            .skip(before)
            .map(|f| (f.id, source_stem(&f.source)))
            .collect();
        for (id, stem) in new_faces {
            if let Some(stem) = stem {
                self.aliases.entry(stem.to_lowercase()).or_insert(id);
            }
        }
    }

    fn find(&self, family: &str) -> Option<fontdb::ID> {
        let query = fontdb::Query {
            families: &[fontdb::Family::Name(family)],
            ..fontdb::Query::default()
        };
        self.db
            .query(&query)
            .or_else(|| self.aliases.get(&family.to_lowercase()).copied())
    }

    /// The configured sans-serif face, else the first face in the database.
    fn generic_fallback(&self) -> Option<fontdb::ID> {
        let query = fontdb::Query {
            families: &[fontdb::Family::SansSerif],
            ..fontdb::Query::default()
        };
        self.db
            .query(&query)
            .or_else(|| self.db.faces().next().map(|f| f.id))
    }

    fn face(&self, id: fontdb::ID, family: &str) -> Option<ResolvedFont> {
        let mut loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bytes) = loaded.get(&id).and_then(Weak::upgrade) {
            let index = self.db.face(id)?.index;
            return Some(ResolvedFont {
                family: family.to_owned(),
                bytes,
                index,
            });
        }

        let (bytes, index) = self
            .db
            .with_face_data(id, |data, index| (Arc::new(data.to_vec()), index))?;
        loaded.retain(|_, weak| weak.strong_count() > 0);
        loaded.insert(id, Arc::downgrade(&bytes));
        Some(ResolvedFont {
            family: family.to_owned(),
            bytes,
            index,
        })
    }

    #[cfg(test)]
    fn shared_faces(&self) -> usize {
        let loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        loaded.values().filter(|w| w.strong_count() > 0).count()
    }
}

impl FontResolver for FontDbResolver {
    fn load(&self, family: &str) -> Option<ResolvedFont> {
        if family.eq_ignore_ascii_case("sans-serif") {
            return self
                .generic_fallback()
                .and_then(|id| self.face(id, family));
        }
        self.find(family).and_then(|id| self.face(id, family))
    }

    fn differs_from_fallback(&self, family: &str) -> bool {
        match (self.find(family), self.generic_fallback()) {
            (Some(found), Some(fallback)) => found != fallback,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

fn source_stem(source: &fontdb::Source) -> Option<String> {
    let path = match source {
        fontdb::Source::File(p) => p.as_path(),
        fontdb::Source::SharedFile(p, _) => p.as_path(),
        fontdb::Source::Binary(_) => return None,
    };
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}
