use serde::{Deserialize, Serialize};

/// Presentation state of an async action control.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl ButtonStatus {
    /// Success and Error are held for display before any reset.
    pub fn is_settled(self) -> bool {
        matches!(self, ButtonStatus::Success | ButtonStatus::Error)
    }
}
