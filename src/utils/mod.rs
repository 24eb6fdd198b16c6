//! Shared utility functions

pub mod version;

pub use version::{is_greater_version, Version, VersionError};
