//! Extension run info: first install vs. version update

/// Describes how the current process start relates to the previously
/// installed extension version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    pub is_first_run: bool,
    pub is_update: bool,
    pub current_version: String,
    pub prev_version: Option<String>,
}

impl RunInfo {
    /// Derive run flags from the current version and the persisted marker.
    pub fn derive(current_version: &str, prev_version: Option<String>) -> Self {
        let changed = prev_version.as_deref() != Some(current_version);
        Self {
            is_first_run: changed && prev_version.is_none(),
            is_update: changed && prev_version.is_some(),
            current_version: current_version.to_string(),
            prev_version,
        }
    }
}
