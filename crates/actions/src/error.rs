use tokio::task::JoinError;

/// Why an action did not succeed.
#[derive(Debug, PartialEq, Eq)]
pub enum ActionFailure<E> {
    /// The action returned an error.
    Rejected(E),
    /// The action panicked; carries the panic message when it was a string.
    Panicked(String),
    /// The runtime dropped the action before it finished.
    Cancelled,
}

impl<E> ActionFailure<E> {
    pub fn rejection(&self) -> Option<&E> {
        match self {
            ActionFailure::Rejected(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn from_join(err: JoinError) -> Self {
        if !err.is_panic() {
            return ActionFailure::Cancelled;
        }
        let payload = err.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        ActionFailure::Panicked(message)
    }
}

impl<E: std::fmt::Display> std::fmt::Display for ActionFailure<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionFailure::Rejected(e) => write!(f, "{e}"),
            ActionFailure::Panicked(msg) => write!(f, "action panicked: {msg}"),
            ActionFailure::Cancelled => write!(f, "action was cancelled"),
        }
    }
}

impl<E> std::error::Error for ActionFailure<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ActionFailure::Rejected(e) => Some(e),
            _ => None,
        }
    }
}
