//! Error type for response parsing.

use thiserror::Error;

/// Error returned when a response payload cannot be turned into records.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body does not match the expected schema.
    #[error("Cannot parse {entity} response: {source}")]
    Json {
        /// What was being parsed.
        entity: &'static str,
        /// Underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// The response reports a state that is not a success.
    #[error("{entity} state '{state}' is not a success")]
    UnexpectedState {
        /// What was being parsed.
        entity: &'static str,
        /// The state received.
        state: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_state_message() {
        let error = ParseError::UnexpectedState {
            entity: "reserved order",
            state: "SOLD_OUT".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "reserved order state 'SOLD_OUT' is not a success"
        );
    }

    #[test]
    fn test_json_error_names_the_entity() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = ParseError::Json {
            entity: "store list",
            source,
        };
        assert!(error.to_string().starts_with("Cannot parse store list response"));
    }
}
