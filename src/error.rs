use thiserror::Error;

/// Failures of a single request to the assistant endpoint.
///
/// The `Display` output is what ends up inside the errored bubble, so every
/// variant carries the warning prefix the widget shows to the user.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("⚠️ Server returned {0}")]
    Status(u16),

    #[error("⚠️ Could not reach the assistant: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("⚠️ Could not read the response: {0}")]
    Body(#[source] reqwest::Error),

    #[error("⚠️ Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ChatError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ChatError::Status(code) => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_contains_code() {
        let err = ChatError::Status(500);
        assert_eq!(err.to_string(), "⚠️ Server returned 500");
        assert_eq!(err.status_code(), Some(500));
    }

    #[test]
    fn test_invalid_endpoint_has_no_status() {
        let err = ChatError::InvalidEndpoint("not a url".to_string());
        assert!(err.to_string().contains("not a url"));
        assert_eq!(err.status_code(), None);
    }
}
