//! Data Transfer Objects for the broker API.
//!
//! The same types are used by the HTTP clients in [`crate::client`], so both
//! sides agree on field names (`fileName`, `fileType`, `signedUrl`, `key`).

pub mod request;
pub mod response;
pub mod validation;

pub use request::*;
pub use response::*;
pub use validation::{has_control_chars, ValidatedJson};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use validator::Validate;

    #[test]
    fn test_write_location_request_wire_names() {
        let request = WriteLocationRequest {
            file_name: "report.pdf".to_string(),
            file_type: "application/pdf".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "fileName": "report.pdf", "fileType": "application/pdf" })
        );
    }

    #[test]
    fn test_write_location_request_missing_type_defaults() {
        let request: WriteLocationRequest =
            serde_json::from_value(json!({ "fileName": "a.txt" })).unwrap();
        assert!(request.file_type.is_empty());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_write_location_request_empty_name_invalid() {
        let request = WriteLocationRequest {
            file_name: String::new(),
            file_type: "text/plain".to_string(),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("file_name"));
    }

    #[test]
    fn test_key_request_validation() {
        assert!(KeyRequest { key: "k".to_string() }.validate().is_ok());
        assert!(KeyRequest { key: String::new() }.validate().is_err());
        assert!(KeyRequest { key: "x".repeat(600) }.validate().is_err());
    }

    #[test]
    fn test_signed_url_response_wire_name() {
        let response: SignedUrlResponse =
            serde_json::from_value(json!({ "signedUrl": "https://x/y" })).unwrap();
        assert_eq!(response.signed_url, "https://x/y");
    }
}
