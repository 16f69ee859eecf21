//! Convenience result type alias for scopecast.

use crate::error::AppError;

/// A specialized `Result` type for scopecast operations.
pub type AppResult<T> = Result<T, AppError>;
