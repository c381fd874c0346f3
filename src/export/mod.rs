//! The three exporters and what they share: artifact naming, job coordination, frame sinks.

pub mod capture;
pub mod ffmpeg;
pub mod gif;
pub mod job;
pub mod palette;
pub mod script;
pub mod sink;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::TypeCutResult;

pub use capture::{CaptureOptions, RealtimeCapture};
pub use self::gif::{GifEncoder, GifOptions};
pub use job::{ExportCoordinator, ExportGuard, ExportJob, ExportStatus};
pub use script::{ScriptOptions, export_script, generate_script};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportKind {
    WebM,
    Gif,
    AeScript,
}

impl ExportKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::WebM => "webm",
            Self::Gif => "gif",
            Self::AeScript => "jsx",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::WebM => "video/webm",
            Self::Gif => "image/gif",
            Self::AeScript => "text/plain;charset=utf-8",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WebM => "webm",
            Self::Gif => "gif",
            Self::AeScript => "ae-script",
        })
    }
}

const MAX_SANITIZED_LEN: usize = 20;
const EMPTY_SANITIZED: &str = "animation";

/// Lowercase, map non-alphanumerics to `-`, collapse runs, trim edge hyphens, cap at 20 chars.
pub fn sanitize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed: String = out
        .trim_matches('-')
        .chars()
        .take(MAX_SANITIZED_LEN)
        .collect();
    if trimmed.is_empty() {
        EMPTY_SANITIZED.to_owned()
    } else {
        trimmed
    }
}

/// `type-cut-<sanitized-text>.<ext>`
pub fn export_file_name(kind: ExportKind, text: &str) -> String {
    format!("type-cut-{}.{}", sanitize_text(text), kind.extension())
}

/// Finished export handed to the host as one byte blob.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ExportKind,
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("kind", &self.kind)
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl Artifact {
    pub fn new(kind: ExportKind, text: &str, bytes: Vec<u8>) -> Self {
        Self {
            kind,
            file_name: export_file_name(kind, text),
            mime: kind.mime(),
            bytes,
        }
    }

    /// Write into `dir` under the artifact's file name, replacing any existing file atomically.
    pub fn write_to_dir(&self, dir: &Path) -> TypeCutResult<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
        let path = dir.join(&self.file_name);
        let tmp = dir.join(format!(".{}.partial", self.file_name));
        std::fs::write(&tmp, &self.bytes)
            .with_context(|| format!("failed to write '{}'", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move output into '{}'", path.display()))?;
        Ok(path)
    }
}
