//! The JSON envelope every endpoint returns: a human-readable message,
//! the payload, and optional pagination metadata.

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Meta {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total: Option<i64>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
        }
    }

    /// For endpoints that carry the envelope but have nothing to paginate.
    pub fn empty() -> Self {
        Self {
            page: None,
            per_page: None,
            total: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_meta_serializes_all_null() {
        let value = serde_json::to_value(Meta::empty()).unwrap();
        assert_eq!(value, json!({"page": null, "per_page": null, "total": null}));
    }

    #[test]
    fn envelope_carries_message_and_data() {
        let body = ApiResponse::success("OK", 7, Some(Meta::new(2, 20, 41)));
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["message"], "OK");
        assert_eq!(value["data"], 7);
        assert_eq!(value["meta"]["page"], 2);
    }
}
