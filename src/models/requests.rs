//! Request DTOs for the state API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::service::StateCategory;

/// Request body for `PUT /state/:namespace/:user_id`
///
/// # Fields
/// - `value`: The new state; `null` clears it
/// - `category`: Overrides the namespace's configured persistence
#[derive(Debug, Clone, Deserialize)]
pub struct SetStateRequest {
    pub value: Value,
    #[serde(default)]
    pub category: Option<StateCategory>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_state_request_deserialize() {
        let json = r#"{"value": {"step": "ask_phone", "attempts": 1}}"#;
        let req: SetStateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.value, json!({"step": "ask_phone", "attempts": 1}));
        assert!(req.category.is_none());
    }

    #[test]
    fn test_set_state_request_with_category() {
        let json = r#"{"value": "ru", "category": "ephemeral"}"#;
        let req: SetStateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.category, Some(StateCategory::Ephemeral));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let json = r#"{"value": 1, "category": "forever"}"#;
        assert!(serde_json::from_str::<SetStateRequest>(json).is_err());
    }
}
