use crate::json;
use crate::models::{TaskInfo, UNKNOWN_STATUS};
use crate::outcome::ApiError;

const STATE_CHANGE: &str = "STATE_CHANGE";
const MAPPING_STATES: [&str; 2] = ["MAPPED", "BADIMAGERY"];

/// Parse a Tasking Manager task response.
///
/// A task nobody has mapped yet is a business-rule failure, not a parse
/// failure: the response is fine, there is just nobody to validate.
pub fn parse_task_info(body: &str, project_id: i64, task_id: i64) -> Result<TaskInfo, ApiError> {
    let status = json::find_string_field(body, "taskStatus")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN_STATUS.to_string());

    let mapper = find_mapper(body).ok_or_else(|| {
        ApiError::BusinessRule(format!(
            "no mapper found for task {} in project {}, task may not be mapped yet",
            task_id, project_id
        ))
    })?;

    Ok(TaskInfo {
        project_id,
        task_id,
        mapper_username: Some(mapper),
        status,
    })
}

/// Who mapped the task.
///
/// `taskHistory` arrives newest first; the first state change into a mapped
/// or bad-imagery state wins. Falls back to `properties.mappedBy`.
pub fn find_mapper(body: &str) -> Option<String> {
    mapper_from_history(body).or_else(|| {
        json::find_object(body, "properties")
            .and_then(|properties| json::find_string_field(properties, "mappedBy"))
            .filter(|name| !name.trim().is_empty())
    })
}

fn mapper_from_history(body: &str) -> Option<String> {
    let history = json::find_array(body, "taskHistory")?;

    json::split_top_level_objects(history)
        .into_iter()
        .filter(|entry| json::find_string_field(entry, "action").as_deref() == Some(STATE_CHANGE))
        .filter(|entry| {
            json::find_string_field(entry, "actionText")
                .is_some_and(|text| MAPPING_STATES.iter().any(|state| text.contains(state)))
        })
        .find_map(|entry| json::find_string_field(entry, "actionBy").filter(|name| !name.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASK_WITH_HISTORY: &str = r#"{
        "taskId": 12,
        "projectId": 345,
        "taskStatus": "MAPPED",
        "taskHistory": [
            {"historyId": 4, "action": "LOCKED_FOR_VALIDATION", "actionText": "00:01:00", "actionBy": "val"},
            {"historyId": 3, "action": "STATE_CHANGE", "actionText": "MAPPED", "actionBy": "ana"},
            {"historyId": 2, "action": "COMMENT", "actionText": "MAPPED it all", "actionBy": "eve"},
            {"historyId": 1, "action": "STATE_CHANGE", "actionText": "BADIMAGERY", "actionBy": "ben"}
        ],
        "properties": {"mappedBy": "zed"}
    }"#;

    #[test]
    fn test_history_most_recent_mapping_wins() {
        let info = parse_task_info(TASK_WITH_HISTORY, 345, 12).unwrap();
        assert_eq!(
            info,
            TaskInfo {
                project_id: 345,
                task_id: 12,
                mapper_username: Some("ana".into()),
                status: "MAPPED".into(),
            }
        );
    }

    #[test]
    fn test_bad_imagery_counts_as_mapping() {
        let body = r#"{"taskHistory":[{"action":"STATE_CHANGE","actionText":"BADIMAGERY","actionBy":"ben"}]}"#;
        assert_eq!(find_mapper(body).as_deref(), Some("ben"));
    }

    #[test]
    fn test_falls_back_to_mapped_by() {
        let body = r#"{
            "taskStatus": "VALIDATED",
            "taskHistory": [{"action":"STATE_CHANGE","actionText":"VALIDATED","actionBy":"val"}],
            "properties": {"mappedBy": "zed"}
        }"#;
        let info = parse_task_info(body, 1, 2).unwrap();
        assert_eq!(info.mapper_username.as_deref(), Some("zed"));
        assert_eq!(info.status, "VALIDATED");
    }

    #[test]
    fn test_missing_status_defaults_to_unknown() {
        let body = r#"{"properties": {"mappedBy": "zed"}}"#;
        assert_eq!(parse_task_info(body, 1, 2).unwrap().status, UNKNOWN_STATUS);
    }

    #[test]
    fn test_unmapped_task_is_business_rule_failure() {
        let body = r#"{"taskStatus":"READY","taskHistory":[],"properties":{"mappedBy":null}}"#;
        assert!(matches!(
            parse_task_info(body, 1, 2),
            Err(ApiError::BusinessRule(msg)) if msg.contains("may not be mapped yet")
        ));
    }
}
