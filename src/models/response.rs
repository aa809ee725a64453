use serde::Serialize;
use serde_json::Value;

/// Response envelope shared by every endpoint: `{ "message": ..., "data": ... }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<Value> {
    /// Envelope with a `null` data field.
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_data() {
        let body = serde_json::to_value(ApiResponse::new("OK", serde_json::json!([1, 2]))).unwrap();
        assert_eq!(body["message"], "OK");
        assert_eq!(body["data"], serde_json::json!([1, 2]));
    }

    #[test]
    fn message_only_envelope_has_null_data() {
        let body = serde_json::to_value(ApiResponse::message_only("Task not found")).unwrap();
        assert_eq!(body["message"], "Task not found");
        assert!(body["data"].is_null());
    }
}
