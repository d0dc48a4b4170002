use std::error::Error;
use std::fmt;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Broad classification of an error.
///
/// Most errors are `Internal`. Callers only need to branch on the kind when
/// they want to treat running out of memory differently from a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Catch-all, usually indicates a bug or an unexpected state.
    Internal,
    /// A memory reservation or allocation could not be satisfied.
    ResourceExhausted,
    /// The caller violated an input contract (bad document id, unknown
    /// segment, etc).
    InvalidInput,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => write!(f, "Internal"),
            Self::ResourceExhausted => write!(f, "Resource exhausted"),
            Self::InvalidInput => write!(f, "Invalid input"),
        }
    }
}

#[derive(Debug)]
pub struct DbError {
    inner: Box<DbErrorInner>,
}

#[derive(Debug)]
struct DbErrorInner {
    msg: String,
    kind: ErrorKind,
    source: Option<Box<dyn Error + Send + Sync>>,
    /// Extra key/value pairs for additional context.
    fields: Vec<(&'static str, String)>,
}

impl DbError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Internal, msg)
    }

    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        DbError {
            inner: Box::new(DbErrorInner {
                msg: msg.into(),
                kind,
                source: None,
                fields: Vec::new(),
            }),
        }
    }

    pub fn resource_exhausted(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::ResourceExhausted, msg)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::InvalidInput, msg)
    }

    pub fn with_source(mut self, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        self.inner.source = Some(source.into());
        self
    }

    /// Attach a field to the error.
    pub fn with_field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.inner.fields.push((key, value.to_string()));
        self
    }

    pub fn get_msg(&self) -> &str {
        &self.inner.msg
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn get_field(&self, key: &str) -> Option<&str> {
        self.inner
            .fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.msg)?;

        if !self.inner.fields.is_empty() {
            write!(f, " (")?;
            for (idx, (key, value)) in self.inner.fields.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}: {value}")?;
            }
            write!(f, ")")?;
        }

        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }

        Ok(())
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<std::collections::TryReserveError> for DbError {
    fn from(value: std::collections::TryReserveError) -> Self {
        DbError::resource_exhausted("Failed to allocate memory").with_source(value)
    }
}

pub trait OptionExt<T> {
    /// Return an error indicating that `thing` was required, but not found.
    fn required(self, thing: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, thing: &'static str) -> Result<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(DbError::new(format!("Missing required value: {thing}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_fields() {
        let err = DbError::new("Bucket out of range")
            .with_field("bucket", 12)
            .with_field("len", 4);
        assert_eq!("Bucket out of range (bucket: 12, len: 4)", err.to_string());
        assert_eq!(Some("12"), err.get_field("bucket"));
        assert_eq!(None, err.get_field("missing"));
    }

    #[test]
    fn display_with_source() {
        let err = DbError::new("outer").with_source(DbError::new("inner"));
        assert_eq!("outer\nError source: inner", err.to_string());
        assert!(err.source().is_some());
    }

    #[test]
    fn kinds() {
        assert_eq!(ErrorKind::Internal, DbError::new("a").kind());
        assert_eq!(
            ErrorKind::ResourceExhausted,
            DbError::resource_exhausted("a").kind()
        );
        assert_eq!(ErrorKind::InvalidInput, DbError::invalid_input("a").kind());
    }

    #[test]
    fn try_reserve_is_resource_exhausted() {
        let mut v: Vec<u64> = Vec::new();
        let err: DbError = v.try_reserve_exact(usize::MAX).unwrap_err().into();
        assert_eq!(ErrorKind::ResourceExhausted, err.kind());
    }

    #[test]
    fn option_required() {
        let v: Option<i32> = None;
        let err = v.required("segment values").unwrap_err();
        assert_eq!("Missing required value: segment values", err.get_msg());
    }
}
