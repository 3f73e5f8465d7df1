//! Utility modules: logger setup, developer logging, numeric conversions.
pub mod devlog;
pub mod logger;
pub mod num;
