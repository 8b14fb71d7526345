//! Domain parsers built on the [`crate::json`] field extractor
//!
//! Each parser is a pure function from raw response text to a typed result.
//! Missing structure is a [`ApiError::Parse`]; a well-formed response that
//! cannot satisfy the request is a [`ApiError::BusinessRule`].
//!
//! [`ApiError::Parse`]: crate::outcome::ApiError::Parse
//! [`ApiError::BusinessRule`]: crate::outcome::ApiError::BusinessRule

mod release;
mod submission;
mod task;
mod urls;
mod users;

pub use release::parse_release;
pub use submission::{parse_drive_url, parse_receipt};
pub use task::{find_mapper, parse_task_info};
pub use urls::{parse_changeset_comment, parse_task_url};
pub use users::{parse_user_id, parse_user_list};
