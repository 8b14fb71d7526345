use crate::json;
use crate::models::{UNKNOWN_ID, UserRecord};
use crate::outcome::ApiError;

/// Parse `{"data": [{"osm_username", "settlement", "user_id"}, ...]}`.
///
/// Records without an `osm_username` are skipped.
pub fn parse_user_list(body: &str) -> Result<Vec<UserRecord>, ApiError> {
    let data = json::find_array(body, "data")
        .ok_or_else(|| ApiError::Parse("no data array in user list response".to_string()))?;

    Ok(json::split_top_level_objects(data)
        .into_iter()
        .filter_map(parse_user)
        .collect())
}

fn parse_user(object: &str) -> Option<UserRecord> {
    let osm_username = json::find_string_field(object, "osm_username").filter(|n| !n.trim().is_empty())?;

    Some(UserRecord {
        osm_username,
        settlement: json::find_string_field(object, "settlement").unwrap_or_default(),
        user_id: json::find_int_field(object, "user_id").unwrap_or(UNKNOWN_ID),
    })
}

/// Extract the `user_id` from a lookup-by-username response
pub fn parse_user_id(body: &str, username: &str) -> Result<i64, ApiError> {
    json::find_int_field(body, "user_id")
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::BusinessRule(format!("no user_id for username '{}'", username)))
}
