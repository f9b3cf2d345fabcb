use crate::content::ContentKey;

/// Generic message shown when a service cannot be reached or answers without a usable error.
pub const CONNECTIVITY_MESSAGE: &str =
    "Could not connect to the server. Please check your Internet connection.";

/// Failures while loading a post's comment state.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("No content found on the ledger for {0}. Try re-submitting the post to the ledger.")]
    NotFound(ContentKey),

    #[error("Ledger returned an error: {0}")]
    Ledger(String),

    #[error("Ledger request failed: {0:#}")]
    Transport(#[source] anyhow::Error),

    #[error("Scoring service failed: {0}")]
    Scores(#[from] ServiceError),
}

/// Failures reported by the platform API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("{0}")]
    Unreachable(String),

    /// Rejected locally before anything was sent.
    #[error("{0}")]
    Invalid(String),
}

impl ServiceError {
    /// Builds the user-facing error for a failed response, preferring the message the
    /// service put in its body.
    pub fn from_response(status: u16, body: &[u8], fallback: &str) -> Self {
        let message = extract_message(body).unwrap_or_else(|| fallback.to_string());
        ServiceError::Rejected { status, message }
    }

    pub fn message(&self) -> &str {
        match self {
            ServiceError::Rejected { message, .. } => message,
            ServiceError::Unreachable(message) => message,
            ServiceError::Invalid(message) => message,
        }
    }
}

fn extract_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    ["error", "message"]
        .iter()
        .filter_map(|field| value.get(field))
        .find_map(|v| match v {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Object(o) => o
                .get("message")
                .and_then(|m| m.as_str())
                .map(|m| m.to_string()),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_error_field_from_body() {
        let err = ServiceError::from_response(422, br#"{"error": "Already voted"}"#, "fallback");
        assert_eq!(err.message(), "Already voted");
    }

    #[test]
    fn falls_back_on_unparseable_body() {
        let err = ServiceError::from_response(502, b"<html>bad gateway</html>", CONNECTIVITY_MESSAGE);
        assert_eq!(err.message(), CONNECTIVITY_MESSAGE);
        assert!(matches!(err, ServiceError::Rejected { status: 502, .. }));
    }

    #[test]
    fn reads_nested_error_message() {
        let err = ServiceError::from_response(400, br#"{"error": {"message": "bad key"}}"#, "x");
        assert_eq!(err.message(), "bad key");
    }
}
