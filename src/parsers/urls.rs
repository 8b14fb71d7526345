use crate::models::TaskRef;

const PROJECTS_SEGMENT: &str = "/projects/";
const CHANGESET_TAG: &str = "#hotosm-project-";
const CHANGESET_TASK: &str = "-task-";

/// Recognize a pasted Tasking Manager URL.
///
/// Accepts `/projects/P/tasks/T`, `/projects/P#task/T`,
/// `/projects/P/map?task=T` and a bare `/projects/P`.
pub fn parse_task_url(url: &str) -> Option<TaskRef> {
    let start = url.find(PROJECTS_SEGMENT)? + PROJECTS_SEGMENT.len();
    let (project_id, rest) = take_number(&url[start..])?;

    let task_id = ["/tasks/", "#task/", "task="]
        .iter()
        .find_map(|marker| {
            rest.find(marker)
                .and_then(|pos| take_number(&rest[pos + marker.len()..]))
                .map(|(id, _)| id)
        });

    Some(TaskRef { project_id, task_id })
}

/// Recognize the `#hotosm-project-P-task-T` hashtag in a changeset comment
pub fn parse_changeset_comment(comment: &str) -> Option<TaskRef> {
    comment.match_indices(CHANGESET_TAG).find_map(|(pos, _)| {
        let (project_id, rest) = take_number(&comment[pos + CHANGESET_TAG.len()..])?;
        let rest = rest.strip_prefix(CHANGESET_TASK)?;
        let (task_id, _) = take_number(rest)?;
        Some(TaskRef {
            project_id,
            task_id: Some(task_id),
        })
    })
}

/// Leading positive decimal number and the remainder
fn take_number(s: &str) -> Option<(i64, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let number = s[..end].parse::<i64>().ok().filter(|n| *n > 0)?;
    Some((number, &s[end..]))
}
