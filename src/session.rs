//! Validation session state machine
//!
//! A [`ValidationSession`] owns the payload for one validation pass and
//! decides which remote calls are legal. Remote calls themselves happen
//! elsewhere (see [`crate::worker`]); the session is told about their
//! outcome through the `finish_*` methods. A failed call never advances the
//! state, it only leaves a message for the operator.

use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info};

use crate::http::FileSource;
use crate::models::{
    ErrorCounts, ErrorType, SubmissionPayload, SubmissionReceipt, TaskInfo, UploadPlan, UserRecord,
    ValidationStatus,
};
use crate::outcome::ApiError;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    FetchingUsers,
    UsersLoaded,
    Isolating,
    Isolated,
    Submitted,
    Exported,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::FetchingUsers => "fetching users",
            SessionState::UsersLoaded => "users loaded",
            SessionState::Isolating => "isolating",
            SessionState::Isolated => "isolated",
            SessionState::Submitted => "submitted",
            SessionState::Exported => "exported",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },

    #[error("cannot submit, missing: {}", .0.join(", "))]
    Incomplete(Vec<&'static str>),

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// One validator's pass over one mapper's work
#[derive(Debug, Clone)]
pub struct ValidationSession {
    state: SessionState,
    /// State to return to if the pending refresh fails
    refresh_origin: SessionState,
    payload: SubmissionPayload,
    users: Vec<UserRecord>,
    receipt: Option<SubmissionReceipt>,
    drive_url: Option<String>,
    message: Option<String>,
}

impl ValidationSession {
    pub fn new(validator_username: impl Into<String>) -> Self {
        Self {
            state: SessionState::Idle,
            refresh_origin: SessionState::Idle,
            payload: default_payload(validator_username.into()),
            users: Vec::new(),
            receipt: None,
            drive_url: None,
            message: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn payload(&self) -> &SubmissionPayload {
        &self.payload
    }

    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }

    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    pub fn drive_url(&self) -> Option<&str> {
        self.drive_url.as_deref()
    }

    /// Last message for the operator, if any
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    // Field edits

    pub fn set_task_id(&mut self, task_id: impl Into<String>) {
        self.payload.task_id = task_id.into().trim().to_string();
    }

    pub fn set_mapper_username(&mut self, username: impl Into<String>) {
        self.payload.mapper_username = username.into().trim().to_string();
    }

    pub fn set_validator_username(&mut self, username: impl Into<String>) {
        self.payload.validator_username = username.into().trim().to_string();
    }

    /// Set the validation date; an empty string clears it
    pub fn set_date(&mut self, date: &str) -> Result<(), SessionError> {
        let date = date.trim();
        if !date.is_empty() && NaiveDate::parse_from_str(date, DATE_FORMAT).is_err() {
            return Err(SessionError::InvalidDate(date.to_string()));
        }
        self.payload.date = date.to_string();
        Ok(())
    }

    pub fn set_settlement(&mut self, settlement: impl Into<String>) {
        self.payload.settlement = settlement.into().trim().to_string();
    }

    pub fn set_total_buildings(&mut self, total: u32) {
        self.payload.total_buildings = total;
    }

    pub fn set_error_count(&mut self, error_type: ErrorType, count: u32) {
        self.payload.error_counts.set(error_type, count);
    }

    pub fn set_status(&mut self, status: ValidationStatus) {
        self.payload.status = status;
    }

    pub fn set_comments(&mut self, comments: impl Into<String>) {
        self.payload.comments = comments.into();
    }

    /// Pick a mapper from the loaded directory, taking their settlement too
    pub fn select_mapper(&mut self, user: &UserRecord) {
        self.payload.mapper_username = user.osm_username.clone();
        if !user.settlement.is_empty() {
            self.payload.settlement = user.settlement.clone();
        }
    }

    /// Fill task and mapper from a Tasking Manager lookup.
    ///
    /// Returns `false` and changes nothing once the payload has been submitted.
    pub fn apply_task_info(&mut self, task: &TaskInfo) -> bool {
        if matches!(self.state, SessionState::Submitted | SessionState::Exported) {
            debug!(state = %self.state, "Ignoring late task lookup");
            return false;
        }

        self.payload.task_id = task.task_id.to_string();
        if let Some(mapper) = &task.mapper_username {
            self.payload.mapper_username = mapper.clone();
        }
        if let Some(settlement) = self
            .users
            .iter()
            .find(|u| Some(&u.osm_username) == task.mapper_username.as_ref())
            .map(|u| u.settlement.clone())
            .filter(|s| !s.is_empty())
        {
            self.payload.settlement = settlement;
        }
        true
    }

    // User directory refresh

    pub fn begin_refresh(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle | SessionState::UsersLoaded => {
                self.refresh_origin = self.state;
                self.transition(SessionState::FetchingUsers);
                Ok(())
            }
            state => Err(SessionError::InvalidTransition {
                action: "refresh users",
                state,
            }),
        }
    }

    pub fn finish_refresh(&mut self, result: Result<Vec<UserRecord>, ApiError>) {
        if self.state != SessionState::FetchingUsers {
            debug!(state = %self.state, "Ignoring late user list result");
            return;
        }

        match result {
            Ok(users) => {
                info!(count = users.len(), "User directory loaded");
                self.users = users;
                self.message = None;
                self.transition(SessionState::UsersLoaded);
            }
            Err(e) => {
                self.message = Some(format!("Failed to load users: {}", e));
                self.transition(self.refresh_origin);
            }
        }
    }

    // Local isolation of the mapper's data

    pub fn begin_isolation(&mut self) -> Result<(), SessionError> {
        self.require(SessionState::UsersLoaded, "isolate mapper data")?;
        self.transition(SessionState::Isolating);
        Ok(())
    }

    pub fn finish_isolation(&mut self, result: Result<(), String>) -> Result<(), SessionError> {
        self.require(SessionState::Isolating, "finish isolation")?;
        match result {
            Ok(()) => {
                self.message = None;
                self.transition(SessionState::Isolated);
            }
            Err(reason) => {
                self.message = Some(format!("Isolation failed: {}", reason));
                self.transition(SessionState::UsersLoaded);
            }
        }
        Ok(())
    }

    // Submission

    /// Mapper, date and a positive building count are required; comments
    /// and error counts are not.
    pub fn can_submit(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.payload.mapper_username.is_empty() {
            missing.push("mapper username");
        }
        if self.payload.date.is_empty() {
            missing.push("date");
        }
        if self.payload.total_buildings == 0 {
            missing.push("total buildings");
        }
        missing
    }

    /// Payload to send, if a submission is legal right now
    pub fn begin_submission(&mut self) -> Result<SubmissionPayload, SessionError> {
        self.require(SessionState::Isolated, "submit")?;

        let missing = self.missing_fields();
        if !missing.is_empty() {
            let error = SessionError::Incomplete(missing);
            self.message = Some(error.to_string());
            return Err(error);
        }

        if self.payload.error_counts.total() > 0 && self.payload.comments.trim().is_empty() {
            self.message = Some("Comments are recommended when errors were found".to_string());
        }

        Ok(self.payload.clone())
    }

    pub fn finish_submission(&mut self, result: Result<SubmissionReceipt, ApiError>) {
        if self.state != SessionState::Isolated {
            debug!(state = %self.state, "Ignoring late submission result");
            return;
        }

        match result {
            Ok(mut receipt) => {
                if receipt.mapper_name.is_empty() {
                    receipt.mapper_name = self.payload.mapper_username.clone();
                }
                if receipt.validator_name.is_empty() {
                    receipt.validator_name = self.payload.validator_username.clone();
                }
                info!(log_id = receipt.log_id, "Validation submitted");
                self.message = Some(format!(
                    "Validation log {} recorded for {}",
                    receipt.log_id, receipt.mapper_name
                ));
                self.receipt = Some(receipt);
                self.transition(SessionState::Submitted);
            }
            Err(e) => {
                self.message = Some(format!("Submission failed: {}", e));
            }
        }
    }

    // Upload and export

    /// Describe the upload of the exported file, keyed on the submission's log ID
    pub fn prepare_upload(
        &self,
        file_name: impl Into<String>,
        file: FileSource,
    ) -> Result<UploadPlan, SessionError> {
        self.require(SessionState::Submitted, "upload")?;
        let receipt = self.receipt.as_ref().ok_or(SessionError::InvalidTransition {
            action: "upload",
            state: self.state,
        })?;

        let known_id = |username: &str| {
            self.users
                .iter()
                .find(|u| u.osm_username == username && u.user_id > 0)
                .map(|u| u.user_id)
        };

        Ok(UploadPlan {
            log_id: receipt.log_id,
            mapper_username: self.payload.mapper_username.clone(),
            validator_username: self.payload.validator_username.clone(),
            mapper_user_id: known_id(&self.payload.mapper_username),
            validator_user_id: known_id(&self.payload.validator_username),
            file_name: file_name.into(),
            file,
            task_id: Some(self.payload.task_id.clone()).filter(|t| !t.is_empty()),
            settlement: Some(self.payload.settlement.clone()).filter(|s| !s.is_empty()),
        })
    }

    pub fn finish_upload(&mut self, result: Result<String, ApiError>) {
        if self.state != SessionState::Submitted {
            debug!(state = %self.state, "Ignoring late upload result");
            return;
        }

        match result {
            Ok(url) => {
                self.message = Some(format!("Uploaded to {}", url));
                self.drive_url = Some(url);
            }
            Err(e) => {
                self.message = Some(format!("Upload failed: {}", e));
            }
        }
    }

    pub fn export(&mut self) -> Result<(), SessionError> {
        self.require(SessionState::Submitted, "export")?;
        self.transition(SessionState::Exported);
        Ok(())
    }

    /// Back to `Idle` with a fresh payload. The validator identity is kept.
    pub fn reset(&mut self) {
        let validator = std::mem::take(&mut self.payload.validator_username);
        *self = Self::new(validator);
        debug!("Session reset");
    }

    fn require(&self, expected: SessionState, action: &'static str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                action,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "Session transition");
        self.state = next;
    }
}

fn default_payload(validator_username: String) -> SubmissionPayload {
    SubmissionPayload {
        validator_username,
        date: chrono::Local::now().date_naive().format(DATE_FORMAT).to_string(),
        error_counts: ErrorCounts::default(),
        status: ValidationStatus::Validated,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn user(name: &str, settlement: &str, id: i64) -> UserRecord {
        UserRecord {
            osm_username: name.into(),
            settlement: settlement.into(),
            user_id: id,
        }
    }

    fn isolated_session() -> ValidationSession {
        let mut session = ValidationSession::new("val");
        session.begin_refresh().unwrap();
        session.finish_refresh(Ok(vec![user("ana", "Kibera", 4), user("val", "", 9)]));
        session.begin_isolation().unwrap();
        session.finish_isolation(Ok(())).unwrap();
        session
    }

    fn receipt() -> SubmissionReceipt {
        SubmissionReceipt {
            log_id: 55,
            mapper_name: String::new(),
            validator_name: "Val V".into(),
        }
    }

    #[test]
    fn test_refresh_success_and_failure() {
        let mut session = ValidationSession::new("val");
        session.begin_refresh().unwrap();
        assert_eq!(session.state(), SessionState::FetchingUsers);
        session.finish_refresh(Err(ApiError::Transport("refused".into())));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.message().unwrap().contains("refused"));

        session.begin_refresh().unwrap();
        session.finish_refresh(Ok(vec![user("ana", "", 4)]));
        assert_eq!(session.state(), SessionState::UsersLoaded);
        assert_eq!(session.users().len(), 1);
        assert_eq!(session.message(), None);

        // A failed re-refresh keeps the loaded state
        session.begin_refresh().unwrap();
        session.finish_refresh(Err(ApiError::Server { code: 503, message: "down".into() }));
        assert_eq!(session.state(), SessionState::UsersLoaded);
    }

    #[test]
    fn test_refresh_not_allowed_mid_isolation() {
        let mut session = isolated_session();
        assert_eq!(
            session.begin_refresh(),
            Err(SessionError::InvalidTransition {
                action: "refresh users",
                state: SessionState::Isolated,
            })
        );
    }

    #[test]
    fn test_isolation_requires_users() {
        let mut session = ValidationSession::new("val");
        assert!(session.begin_isolation().is_err());
    }

    #[test]
    fn test_isolation_failure_returns_to_users_loaded() {
        let mut session = ValidationSession::new("val");
        session.begin_refresh().unwrap();
        session.finish_refresh(Ok(vec![]));
        session.begin_isolation().unwrap();
        session.finish_isolation(Err("no layer".into())).unwrap();
        assert_eq!(session.state(), SessionState::UsersLoaded);
    }

    #[test]
    fn test_can_submit_requires_buildings() {
        let mut session = isolated_session();
        session.set_mapper_username("ana");
        session.set_date("2024-01-01").unwrap();
        session.set_total_buildings(0);
        assert!(!session.can_submit());

        session.set_total_buildings(5);
        session.set_error_count(ErrorType::MissingTags, 4);
        assert!(session.can_submit());
    }

    #[test]
    fn test_incomplete_submission_rejected_locally() {
        let mut session = isolated_session();
        session.set_mapper_username("");
        session.set_date("2024-01-01").unwrap();
        session.set_total_buildings(5);

        assert_eq!(
            session.begin_submission(),
            Err(SessionError::Incomplete(vec!["mapper username"]))
        );
        assert_eq!(session.state(), SessionState::Isolated);
    }

    #[test]
    fn test_submission_requires_isolation() {
        let mut session = ValidationSession::new("val");
        session.set_mapper_username("ana");
        session.set_total_buildings(5);
        assert!(matches!(
            session.begin_submission(),
            Err(SessionError::InvalidTransition { action: "submit", .. })
        ));
    }

    #[test]
    fn test_submission_success_retains_receipt() {
        let mut session = isolated_session();
        session.set_mapper_username("ana");
        session.set_total_buildings(5);
        let payload = session.begin_submission().unwrap();
        assert_eq!(payload.validator_username, "val");

        session.finish_submission(Ok(receipt()));
        assert_eq!(session.state(), SessionState::Submitted);
        let stored = session.receipt().unwrap();
        assert_eq!(stored.log_id, 55);
        assert_eq!(stored.mapper_name, "ana");
        assert_eq!(stored.validator_name, "Val V");
    }

    #[test]
    fn test_submission_failure_keeps_state() {
        let mut session = isolated_session();
        session.set_mapper_username("ana");
        session.set_total_buildings(5);
        session.begin_submission().unwrap();
        session.finish_submission(Err(ApiError::Client {
            code: 400,
            kind: crate::outcome::ClientErrorKind::BadRequest,
            message: "bad date".into(),
        }));
        assert_eq!(session.state(), SessionState::Isolated);
        assert!(session.message().unwrap().contains("bad date"));
        assert!(session.receipt().is_none());
    }

    #[test]
    fn test_comments_recommended_not_required() {
        let mut session = isolated_session();
        session.set_mapper_username("ana");
        session.set_total_buildings(5);
        session.set_error_count(ErrorType::HangingNodes, 2);
        assert!(session.begin_submission().is_ok());
        assert!(session.message().unwrap().contains("recommended"));
    }

    #[test]
    fn test_invalid_date_rejected() {
        let mut session = ValidationSession::new("val");
        assert_eq!(
            session.set_date("01/02/2024"),
            Err(SessionError::InvalidDate("01/02/2024".into()))
        );
        assert!(session.set_date("").is_ok());
        assert!(!session.can_submit());
    }

    #[test]
    fn test_upload_plan_uses_known_ids() {
        let mut session = isolated_session();
        let ana = session.users()[0].clone();
        session.select_mapper(&ana);
        session.set_task_id("T-1");
        session.set_total_buildings(5);
        session.begin_submission().unwrap();
        session.finish_submission(Ok(receipt()));

        let plan = session
            .prepare_upload("ana.osm", FileSource::Bytes(Bytes::from_static(b"<osm/>")))
            .unwrap();
        assert_eq!(plan.log_id, 55);
        assert_eq!(plan.mapper_user_id, Some(4));
        assert_eq!(plan.validator_user_id, Some(9));
        assert_eq!(plan.task_id.as_deref(), Some("T-1"));
        assert_eq!(plan.settlement.as_deref(), Some("Kibera"));
    }

    #[test]
    fn test_upload_requires_submission() {
        let session = isolated_session();
        assert!(session
            .prepare_upload("a.osm", FileSource::Bytes(Bytes::new()))
            .is_err());
    }

    #[test]
    fn test_export_and_reset() {
        let mut session = isolated_session();
        session.set_mapper_username("ana");
        session.set_total_buildings(5);
        session.set_error_count(ErrorType::MissingTags, 1);
        session.begin_submission().unwrap();
        session.finish_submission(Ok(receipt()));
        session.finish_upload(Ok("https://drive.example/f/1".into()));
        assert_eq!(session.drive_url(), Some("https://drive.example/f/1"));

        session.export().unwrap();
        assert_eq!(session.state(), SessionState::Exported);
        assert!(session.export().is_err());

        session.reset();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.payload().mapper_username, "");
        assert_eq!(session.payload().validator_username, "val");
        assert_eq!(session.payload().error_counts.total(), 0);
        assert_eq!(session.payload().total_buildings, 0);
        assert!(session.receipt().is_none());
        assert!(session.users().is_empty());
    }

    #[test]
    fn test_apply_task_info() {
        let mut session = isolated_session();
        assert!(session.apply_task_info(&TaskInfo {
            project_id: 1,
            task_id: 77,
            mapper_username: Some("ana".into()),
            status: "MAPPED".into(),
        }));
        assert_eq!(session.payload().task_id, "77");
        assert_eq!(session.payload().mapper_username, "ana");
        assert_eq!(session.payload().settlement, "Kibera");
    }

    #[test]
    fn test_late_task_info_ignored_after_submission() {
        let mut session = isolated_session();
        session.set_mapper_username("ana");
        session.set_task_id("12");
        session.set_total_buildings(10);
        session.begin_submission().unwrap();
        session.finish_submission(Ok(receipt()));
        assert_eq!(session.state(), SessionState::Submitted);

        let late = TaskInfo {
            project_id: 1,
            task_id: 99,
            mapper_username: Some("eve".into()),
            status: "MAPPED".into(),
        };
        assert!(!session.apply_task_info(&late));
        assert_eq!(session.payload().task_id, "12");
        assert_eq!(session.payload().mapper_username, "ana");

        session.export().unwrap();
        assert!(!session.apply_task_info(&late));
        assert_eq!(session.payload().task_id, "12");
    }
}
