//! Result type alias for splitstore

use super::errors::SplitStoreError;

/// Result type alias for splitstore operations
///
/// # Examples
///
/// ```
/// use splitstore::domain::result::Result;
/// use splitstore::domain::errors::SplitStoreError;
///
/// fn reject_rekey(expected: &str, actual: &str) -> Result<()> {
///     if expected != actual {
///         return Err(SplitStoreError::RecordKeyMismatch {
///             expected: expected.to_string(),
///             actual: actual.to_string(),
///         });
///     }
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, SplitStoreError>;
