//! Data carried between the clients, the parsers and the session

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::http::{FilePart, FileSource, MultipartForm};
use crate::outcome::ApiError;

/// Sentinel for an ID the backend did not report
pub const UNKNOWN_ID: i64 = -1;

/// Task status reported when the tracker omits one
pub const UNKNOWN_STATUS: &str = "UNKNOWN";

/// One active mapper from the user directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub osm_username: String,
    pub settlement: String,
    pub user_id: i64,
}

/// A project/task pair recognized in free text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRef {
    pub project_id: i64,
    pub task_id: Option<i64>,
}

/// Task state and mapper as reported by the Tasking Manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub project_id: i64,
    pub task_id: i64,
    pub mapper_username: Option<String>,
    pub status: String,
}

/// Latest published release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Version with any leading `v` removed
    pub version: String,
    pub name: String,
    pub notes: String,
    pub download_url: Option<String>,
}

/// Result of comparing the latest release with the running version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate { current: String, latest: String },
    Available(ReleaseInfo),
}

/// What the backend returns after accepting a validation log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub log_id: i64,
    pub mapper_name: String,
    pub validator_name: String,
}

/// The closed set of error types a validator can count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    HangingNodes,
    OverlappingBuildings,
    BuildingsCrossingHighway,
    ResidentialLanduseMissing,
    MissingTags,
    ImproperTags,
    FeaturesMisidentified,
    MissingBuildings,
    BuildingInsideBuilding,
    ImproperBuildingGeometry,
}

impl ErrorType {
    /// All error types in wire order
    pub const ALL: [ErrorType; 10] = [
        ErrorType::HangingNodes,
        ErrorType::OverlappingBuildings,
        ErrorType::BuildingsCrossingHighway,
        ErrorType::ResidentialLanduseMissing,
        ErrorType::MissingTags,
        ErrorType::ImproperTags,
        ErrorType::FeaturesMisidentified,
        ErrorType::MissingBuildings,
        ErrorType::BuildingInsideBuilding,
        ErrorType::ImproperBuildingGeometry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::HangingNodes => "hanging_nodes",
            ErrorType::OverlappingBuildings => "overlapping_buildings",
            ErrorType::BuildingsCrossingHighway => "buildings_crossing_highway",
            ErrorType::ResidentialLanduseMissing => "residential_landuse_missing",
            ErrorType::MissingTags => "missing_tags",
            ErrorType::ImproperTags => "improper_tags",
            ErrorType::FeaturesMisidentified => "features_misidentified",
            ErrorType::MissingBuildings => "missing_buildings",
            ErrorType::BuildingInsideBuilding => "building_inside_building",
            ErrorType::ImproperBuildingGeometry => "improper_building_geometry",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['-', ' '], "_");
        ErrorType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown error type: {}", s))
    }
}

/// Per-error-type counts, serialized in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorCounts([u32; 10]);

impl ErrorCounts {
    pub fn get(&self, error_type: ErrorType) -> u32 {
        self.0[error_type.index()]
    }

    pub fn set(&mut self, error_type: ErrorType, count: u32) {
        self.0[error_type.index()] = count;
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ErrorType, u32)> + '_ {
        ErrorType::ALL.into_iter().map(|t| (t, self.get(t)))
    }
}

impl Serialize for ErrorCounts {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(ErrorType::ALL.len()))?;
        for (error_type, count) in self.iter() {
            map.serialize_entry(error_type.as_str(), &count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ValidationStatus {
    #[default]
    Validated,
    Rejected,
}

impl FromStr for ValidationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "validated" | "pass" => Ok(ValidationStatus::Validated),
            "rejected" | "fail" => Ok(ValidationStatus::Rejected),
            _ => Err(format!("unknown validation status: {}", s)),
        }
    }
}

/// Body of `POST /api/validation-log`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SubmissionPayload {
    pub task_id: String,
    #[serde(rename = "mapper_osm_username")]
    pub mapper_username: String,
    #[serde(rename = "validator_osm_username")]
    pub validator_username: String,
    /// YYYY-MM-DD
    #[serde(rename = "validation_date")]
    pub date: String,
    pub settlement: String,
    #[serde(flatten)]
    pub error_counts: ErrorCounts,
    pub total_buildings: u32,
    #[serde(rename = "validation_status")]
    pub status: ValidationStatus,
    #[serde(rename = "validator_comments")]
    pub comments: String,
}

impl SubmissionPayload {
    pub fn to_json(&self) -> Result<String, ApiError> {
        serde_json::to_string(self).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

/// Everything needed to upload an exported file once user IDs are resolved.
///
/// IDs already known from the user directory are carried along; missing
/// ones are looked up by username before the upload.
#[derive(Debug, Clone)]
pub struct UploadPlan {
    pub log_id: i64,
    pub mapper_username: String,
    pub validator_username: String,
    pub mapper_user_id: Option<i64>,
    pub validator_user_id: Option<i64>,
    pub file_name: String,
    pub file: FileSource,
    pub task_id: Option<String>,
    pub settlement: Option<String>,
}

/// Body of `POST /api/upload-osm`
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub file: FileSource,
    pub validation_log_id: i64,
    pub mapper_user_id: i64,
    pub validator_user_id: i64,
    pub task_id: Option<String>,
    pub settlement: Option<String>,
}

impl UploadRequest {
    /// Fails when either user ID is still unknown
    pub fn new(
        file_name: impl Into<String>,
        file: FileSource,
        validation_log_id: i64,
        mapper_user_id: i64,
        validator_user_id: i64,
    ) -> Result<Self, ApiError> {
        if validation_log_id <= 0 {
            return Err(ApiError::BusinessRule(
                "upload requires a validation log ID from a prior submission".to_string(),
            ));
        }
        if mapper_user_id <= 0 || validator_user_id <= 0 {
            return Err(ApiError::BusinessRule(
                "upload requires resolved mapper and validator user IDs".to_string(),
            ));
        }

        Ok(Self {
            file_name: file_name.into(),
            file,
            validation_log_id,
            mapper_user_id,
            validator_user_id,
            task_id: None,
            settlement: None,
        })
    }

    pub fn task_id(mut self, task_id: Option<String>) -> Self {
        self.task_id = task_id.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn settlement(mut self, settlement: Option<String>) -> Self {
        self.settlement = settlement.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn to_form(&self) -> MultipartForm {
        MultipartForm::new()
            .text("validation_log_id", self.validation_log_id.to_string())
            .text("mapper_user_id", self.mapper_user_id.to_string())
            .text("validator_user_id", self.validator_user_id.to_string())
            .optional_text("task_id", self.task_id.clone())
            .optional_text("settlement", self.settlement.clone())
            .file(FilePart::osm_xml("file", self.file_name.clone(), self.file.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_error_type_parse() {
        assert_eq!("hanging_nodes".parse::<ErrorType>(), Ok(ErrorType::HangingNodes));
        assert_eq!("Missing Tags".parse::<ErrorType>(), Ok(ErrorType::MissingTags));
        assert_eq!(
            "building-inside-building".parse::<ErrorType>(),
            Ok(ErrorType::BuildingInsideBuilding)
        );
        assert!("unknown".parse::<ErrorType>().is_err());
    }

    #[test]
    fn test_error_counts() {
        let mut counts = ErrorCounts::default();
        counts.set(ErrorType::MissingTags, 3);
        counts.set(ErrorType::HangingNodes, 2);
        assert_eq!(counts.get(ErrorType::MissingTags), 3);
        assert_eq!(counts.total(), 5);
        assert_eq!(counts.iter().count(), 10);
    }

    #[test]
    fn test_payload_json_field_order() {
        let mut payload = SubmissionPayload {
            task_id: "42".into(),
            mapper_username: "ana".into(),
            validator_username: "ben".into(),
            date: "2024-01-01".into(),
            settlement: "Kibera".into(),
            total_buildings: 12,
            status: ValidationStatus::Rejected,
            comments: "two overlaps".into(),
            ..Default::default()
        };
        payload.error_counts.set(ErrorType::OverlappingBuildings, 2);

        let json = payload.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["mapper_osm_username"], "ana");
        assert_eq!(value["validation_status"], "Rejected");
        assert_eq!(value["overlapping_buildings"], 2);
        assert_eq!(value["hanging_nodes"], 0);

        let first = json.find("\"hanging_nodes\"").unwrap();
        let last = json.find("\"improper_building_geometry\"").unwrap();
        assert!(first < last);
    }

    #[test]
    fn test_upload_request_requires_ids() {
        let file = FileSource::Bytes(Bytes::from_static(b"<osm/>"));
        assert!(matches!(
            UploadRequest::new("a.osm", file.clone(), 7, UNKNOWN_ID, 3),
            Err(ApiError::BusinessRule(_))
        ));
        assert!(matches!(
            UploadRequest::new("a.osm", file.clone(), 0, 2, 3),
            Err(ApiError::BusinessRule(_))
        ));
        assert!(UploadRequest::new("a.osm", file, 7, 2, 3).is_ok());
    }

    #[test]
    fn test_upload_form_optional_fields() {
        let file = FileSource::Bytes(Bytes::from_static(b"<osm/>"));
        let request = UploadRequest::new("a.osm", file, 7, 2, 3)
            .unwrap()
            .task_id(Some("T-1".into()))
            .settlement(Some(" ".into()));

        let body = String::from_utf8(request.to_form().render().unwrap().to_vec()).unwrap();
        assert_eq!(body.matches("name=\"task_id\"").count(), 1);
        assert!(body.contains("name=\"task_id\"\r\n\r\nT-1\r\n"));
        assert!(!body.contains("name=\"settlement\""));
        assert!(body.contains("filename=\"a.osm\""));
    }
}
