use std::fmt;

/// Failure reported by a store. Surfaced to callers verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// Store unreachable or timed out.
    Unavailable(String),
    /// Caller lacks rights for the operation.
    PermissionDenied(String),
    /// Target document does not exist.
    NotFound(String),
    /// Write lost a race the store chose to detect.
    Conflict(String),
    /// Stored document could not be decoded.
    Decode(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            StoreError::PermissionDenied(msg) => write!(f, "permission denied: {msg}"),
            StoreError::NotFound(what) => write!(f, "not found: {what}"),
            StoreError::Conflict(msg) => write!(f, "write conflict: {msg}"),
            StoreError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_prefixed_by_kind() {
        assert_eq!(
            StoreError::NotFound("entry abc".to_string()).to_string(),
            "not found: entry abc"
        );
        assert_eq!(
            StoreError::Unavailable("timeout".to_string()).to_string(),
            "store unavailable: timeout"
        );
        assert!(StoreError::NotFound(String::new()).is_not_found());
        assert!(!StoreError::Conflict(String::new()).is_not_found());
    }
}
