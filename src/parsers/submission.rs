use crate::json;
use crate::models::SubmissionReceipt;
use crate::outcome::ApiError;

/// Parse the `201 Created` body of a validation-log submission
pub fn parse_receipt(body: &str) -> Result<SubmissionReceipt, ApiError> {
    let log_id = json::find_int_field(body, "log_id")
        .ok_or_else(|| ApiError::Parse("no log_id in submission response".to_string()))?;

    Ok(SubmissionReceipt {
        log_id,
        mapper_name: json::find_string_field(body, "mapper_name").unwrap_or_default(),
        validator_name: json::find_string_field(body, "validator_name").unwrap_or_default(),
    })
}

/// Parse the upload response's `drive_file_url`
pub fn parse_drive_url(body: &str) -> Result<String, ApiError> {
    json::find_string_field(body, "drive_file_url")
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::Parse("no drive_file_url in upload response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_receipt() {
        let body = r#"{"success":true,"log_id":88,"mapper_name":"Ana K","validator_name":"Ben O"}"#;
        assert_eq!(
            parse_receipt(body).unwrap(),
            SubmissionReceipt {
                log_id: 88,
                mapper_name: "Ana K".into(),
                validator_name: "Ben O".into(),
            }
        );
    }

    #[test]
    fn test_parse_receipt_without_log_id() {
        assert!(matches!(parse_receipt(r#"{"success":true}"#), Err(ApiError::Parse(_))));
    }

    #[test]
    fn test_parse_drive_url() {
        assert_eq!(
            parse_drive_url(r#"{"drive_file_url":"https://drive.example/f/1"}"#).unwrap(),
            "https://drive.example/f/1"
        );
        assert!(parse_drive_url("{}").is_err());
    }
}
