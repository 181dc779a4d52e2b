//! Interpreter helper utilities

pub mod path;

pub use path::{dequote, is_null_device, normalize_path, resolve_path};
