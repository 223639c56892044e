//! Common imports and types used throughout Tioga.

pub use std::collections::HashMap;
pub use std::sync::Arc;

pub type Result<T> = std::result::Result<T, crate::core::errors::BackendError>;
