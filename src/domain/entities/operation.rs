use serde::{Deserialize, Serialize};

/// Verdict of one operation: success, or failure with a human readable,
/// possibly multi-line message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

impl OperationResult {
    pub fn success() -> Self {
        Self {
            success: true,
            message: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    /// Success when no failure text was collected
    pub fn from_failures(message: String) -> Self {
        if message.is_empty() {
            Self::success()
        } else {
            Self::failure(message)
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}
