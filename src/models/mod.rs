//! Core data models for the extension platform layer

pub mod filter;
pub mod request;
pub mod run_info;

pub use filter::*;
pub use request::*;
pub use run_info::*;
