use serde::{Deserialize, Serialize};

/// Load lifecycle of one resource key, shared by every consumer of that key.
///
/// Idle → Loading → Complete | Error
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    #[default]
    Idle,
    Loading,
    Complete,
    Error,
}

impl SourceStatus {
    /// `Complete` and `Error` end a key's lifecycle; only a key change leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, SourceStatus::Complete | SourceStatus::Error)
    }

    /// Whether a consumer should show its loading indicator.
    pub fn is_pending(self) -> bool {
        matches!(self, SourceStatus::Idle | SourceStatus::Loading)
    }
}
