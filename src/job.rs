//! AQuA batch-query job: request payload, response shapes, and the poll loop.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Optional job metadata attached to a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOptions {
    pub partner: Option<String>,
    pub project: Option<String>,
    /// Expanded to `<prefix>_<timestamp>` unless `project` is set.
    pub project_prefix: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobRequest<'a> {
    format: &'static str,
    version: &'static str,
    encrypted: &'static str,
    use_query_labels: &'static str,
    date_time_utc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    partner: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<String>,
    queries: Vec<QueryEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct QueryEntry<'a> {
    query: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

impl<'a> JobRequest<'a> {
    pub(crate) fn new<Tz: TimeZone>(
        queries: &'a [String],
        options: &'a JobOptions,
        now: DateTime<Tz>,
    ) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            format: "csv",
            version: "1.1",
            encrypted: "none",
            use_query_labels: "true",
            date_time_utc: "true",
            partner: options.partner.as_deref(),
            project: project_name(
                options.project.as_deref(),
                options.project_prefix.as_deref(),
                now,
            ),
            queries: queries
                .iter()
                .map(|query| QueryEntry {
                    query: query.as_str(),
                    kind: "zoqlexport",
                })
                .collect(),
        }
    }
}

/// Explicit project wins; otherwise the prefix gets a generation timestamp.
pub fn project_name<Tz: TimeZone>(
    project: Option<&str>,
    project_prefix: Option<&str>,
    now: DateTime<Tz>,
) -> Option<String>
where
    Tz::Offset: std::fmt::Display,
{
    if let Some(project) = project.filter(|p| !p.is_empty()) {
        return Some(project.to_string());
    }
    project_prefix
        .filter(|p| !p.is_empty())
        .map(|prefix| format!("{}_{}", prefix, now.format("%Y-%m-%d %H:%M:%S%.6f")))
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobCreated {
    #[serde(default)]
    pub(crate) id: Option<String>,
}

/// State of a submitted job as reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    pub status: String,
    #[serde(default)]
    pub batches: Vec<Batch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Batch {
    #[serde(default, rename = "fileId")]
    pub file_id: Option<String>,
}

impl JobStatus {
    pub fn state(&self) -> JobState {
        if self.status == "completed" {
            JobState::Completed
        } else {
            JobState::Pending
        }
    }

    /// Result file ids in batch order.
    pub fn file_ids(&self) -> Option<Vec<String>> {
        self.batches.iter().map(|b| b.file_id.clone()).collect()
    }
}

/// Polls with `fetch` until the job completes, calling `wait` between attempts.
///
/// Returns the completed status without waiting after it. With
/// `max_attempts = Some(n)`, fails with [`Error::RetriesExceeded`] once `n`
/// fetches came back pending; `None` polls forever.
pub fn poll_until_complete<F, W>(
    mut fetch: F,
    mut wait: W,
    max_attempts: Option<u32>,
) -> Result<JobStatus>
where
    F: FnMut() -> Result<JobStatus>,
    W: FnMut(u32),
{
    let mut attempts: u32 = 0;
    let mut last_status: Option<String> = None;

    loop {
        let status = fetch()?;

        if last_status.as_deref() != Some(status.status.as_str()) {
            tracing::info!(status = %status.status, "job status");
            last_status = Some(status.status.clone());
        }

        if status.state() == JobState::Completed {
            return Ok(status);
        }

        wait(attempts);
        attempts = attempts.saturating_add(1);
        if max_attempts.is_some_and(|max| attempts >= max) {
            return Err(Error::RetriesExceeded { attempts });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use std::collections::VecDeque;

    fn status(s: &str, files: &[&str]) -> JobStatus {
        JobStatus {
            status: s.to_string(),
            batches: files
                .iter()
                .map(|f| Batch {
                    file_id: Some(f.to_string()),
                })
                .collect(),
        }
    }

    fn scripted(
        mut responses: VecDeque<JobStatus>,
    ) -> impl FnMut() -> Result<JobStatus> {
        move || Ok(responses.pop_front().unwrap_or_else(|| status("pending", &[])))
    }

    #[test]
    fn completes_on_third_call_after_two_waits() {
        let responses = VecDeque::from(vec![
            status("pending", &[]),
            status("pending", &[]),
            status("completed", &["f1"]),
        ]);
        let mut calls = 0;
        let mut fetch = scripted(responses);
        let mut waits = 0;

        let done = poll_until_complete(
            || {
                calls += 1;
                fetch()
            },
            |_| waits += 1,
            None,
        )
        .unwrap();

        assert_eq!(calls, 3);
        assert_eq!(waits, 2);
        assert_eq!(done.file_ids(), Some(vec!["f1".to_string()]));
    }

    #[test]
    fn completed_first_call_never_waits() {
        let mut waits = 0;
        poll_until_complete(
            scripted(VecDeque::from(vec![status("completed", &[])])),
            |_| waits += 1,
            Some(1),
        )
        .unwrap();
        assert_eq!(waits, 0);
    }

    #[test]
    fn retries_exceeded_after_max_attempts() {
        let mut calls = 0;
        let err = poll_until_complete(
            || {
                calls += 1;
                Ok(status("executing", &[]))
            },
            |_| {},
            Some(3),
        )
        .unwrap_err();

        assert_eq!(calls, 3);
        assert!(matches!(err, Error::RetriesExceeded { attempts: 3 }));
    }

    #[test]
    fn wait_receives_attempt_index() {
        let mut seen = Vec::new();
        let _ = poll_until_complete(|| Ok(status("pending", &[])), |n| seen.push(n), Some(4));
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn fetch_errors_propagate_immediately() {
        let mut waits = 0;
        let err = poll_until_complete(
            || {
                Err(Error::Http {
                    status: 500,
                    url: "u".into(),
                    message: "boom".into(),
                })
            },
            |_| waits += 1,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Http { status: 500, .. }));
        assert_eq!(waits, 0);
    }

    #[test]
    fn file_ids_keep_batch_order() {
        let s = status("completed", &["c", "a", "b"]);
        assert_eq!(
            s.file_ids(),
            Some(vec!["c".to_string(), "a".to_string(), "b".to_string()])
        );

        let mut missing = s.clone();
        missing.batches[1].file_id = None;
        assert_eq!(missing.file_ids(), None);
    }

    #[test]
    fn explicit_project_wins_over_prefix() {
        assert_eq!(
            project_name(Some("explicit"), Some("myproject"), Utc::now()),
            Some("explicit".to_string())
        );
    }

    #[test]
    fn prefix_gets_timestamp() {
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 13, 5, 9)
            .unwrap();
        let project = project_name(None, Some("myproject"), now).unwrap();
        assert!(project.starts_with("myproject_"));
        assert_eq!(project, "myproject_2024-03-01 13:05:09.000000");
        assert_eq!(project_name(None, None, now), None);
    }

    #[test]
    fn request_payload_shape() {
        let queries = vec![
            "select Id from Account".to_string(),
            "select Id from Invoice".to_string(),
        ];
        let options = JobOptions {
            partner: Some("partner1".into()),
            project: Some("p".into()),
            project_prefix: None,
        };
        let body = serde_json::to_value(JobRequest::new(&queries, &options, Utc::now())).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "format": "csv",
                "version": "1.1",
                "encrypted": "none",
                "useQueryLabels": "true",
                "dateTimeUtc": "true",
                "partner": "partner1",
                "project": "p",
                "queries": [
                    {"query": "select Id from Account", "type": "zoqlexport"},
                    {"query": "select Id from Invoice", "type": "zoqlexport"}
                ]
            })
        );
    }

    #[test]
    fn request_omits_absent_metadata() {
        let queries = vec!["select Id from Account".to_string()];
        let body =
            serde_json::to_value(JobRequest::new(&queries, &JobOptions::default(), Utc::now()))
                .unwrap();
        assert!(body.get("partner").is_none());
        assert!(body.get("project").is_none());
    }
}
