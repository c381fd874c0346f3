use crate::export::ExportKind;

pub type TypeCutResult<T> = Result<T, TypeCutError>;

#[derive(thiserror::Error, Debug)]
pub enum TypeCutError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("{kind} export failed: {message}")]
    Encode { kind: ExportKind, message: String },

    #[error("export busy: a {0} export is already running")]
    ExportBusy(ExportKind),

    #[error("font error: {0}")]
    Font(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TypeCutError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn encode(kind: ExportKind, msg: impl Into<String>) -> Self {
        Self::Encode {
            kind,
            message: msg.into(),
        }
    }

    pub fn font(msg: impl Into<String>) -> Self {
        Self::Font(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Attach an export kind to an error raised inside that export.
    ///
    /// Errors that already describe a capability or busy state keep their own shape.
    pub fn in_export(self, kind: ExportKind) -> Self {
        match self {
            Self::Encode { .. } | Self::Unsupported(_) | Self::ExportBusy(_) => self,
            other => Self::encode(kind, other.to_string()),
        }
    }
}
