use std::fmt;

/// Failure categories callers can match on without comparing message text.
/// The first four are validation failures; `NotFound` is a missing-reference
/// precondition; `StorageUnavailable` covers failed reads/writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    EmptyField,
    InvalidFormat,
    OutOfRange,
    DuplicateKey,
    NotFound,
    StorageUnavailable,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::EmptyField => "empty_field",
            ErrorKind::InvalidFormat => "invalid_format",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::DuplicateKey => "duplicate_key",
            ErrorKind::NotFound => "not_found",
            ErrorKind::StorageUnavailable => "storage_unavailable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoreError {
    pub kind: ErrorKind,
    pub field: Option<String>,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: None,
            message: message.into(),
        }
    }

    pub fn on_field(kind: ErrorKind, field: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: Some(field.to_string()),
            message: message.into(),
        }
    }

    pub fn empty_field(field: &str) -> Self {
        Self::on_field(ErrorKind::EmptyField, field, format!("{} is required", field))
    }

    pub fn invalid_format(field: &str, message: impl Into<String>) -> Self {
        Self::on_field(ErrorKind::InvalidFormat, field, message)
    }

    pub fn out_of_range(field: &str, message: impl Into<String>) -> Self {
        Self::on_field(ErrorKind::OutOfRange, field, message)
    }

    pub fn duplicate_key(field: &str, message: impl Into<String>) -> Self {
        Self::on_field(ErrorKind::DuplicateKey, field, message)
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("{} not found", what))
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CoreError {}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::new(ErrorKind::StorageUnavailable, e.to_string())
    }
}
