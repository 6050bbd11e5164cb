use futures::future::try_join_all;
use tracing::{debug, info_span, instrument, Instrument};

use crate::model::{
    collapse_statuses, normalize_merge_status, MergeStatus, PullRequest, Reviewer, Scope,
};
use crate::transport::types::{CommentThread, PullRequestRecord, RawStatus};
use crate::transport::{GitTransport, TransportError};

/// Fetches active pull requests and enriches each one with its detail,
/// check statuses and unresolved comment count.
///
/// Every pull request is enriched concurrently, and within each pull
/// request the three fetches run concurrently. A single failed fetch fails
/// the whole listing. Results come back in list order.
pub struct PullRequestAggregator<'a, T: GitTransport + ?Sized> {
    transport: &'a T,
}

impl<'a, T: GitTransport + ?Sized> PullRequestAggregator<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    #[instrument(skip(self))]
    pub async fn list_pull_requests(&self, scope: Scope) -> Result<Vec<PullRequest>, TransportError> {
        let listed = self.transport.list_active_pull_requests(scope).await?;
        debug!(listed = listed.len(), "fetched active pull requests");

        try_join_all(listed.into_iter().map(|summary| {
            let span = info_span!(
                "enrich",
                repository = %summary.repository.id,
                pull_request = summary.pull_request_id
            );
            self.enrich(summary).instrument(span)
        }))
        .await
    }

    async fn enrich(&self, summary: PullRequestRecord) -> Result<PullRequest, TransportError> {
        let repository_id = summary.repository.id.clone();
        let id = summary.pull_request_id;

        let (detail, statuses, threads) = tokio::try_join!(
            self.transport.get_pull_request_detail(&repository_id, id),
            self.transport.get_pull_request_statuses(&repository_id, id),
            self.transport.get_pull_request_threads(&repository_id, id),
        )?;
        debug!(statuses = statuses.len(), threads = threads.len(), "fetched enrichment");

        merge(summary, detail, statuses, &threads)
    }
}

/// Threads still marked exactly "active".
pub fn count_unresolved(threads: &[CommentThread]) -> usize {
    threads
        .iter()
        .filter(|t| t.status.as_ref().and_then(|s| s.as_token()) == Some("active"))
        .count()
}

/// Combine the list projection, detail, statuses and threads of one pull
/// request. Detail fields win over list fields.
pub fn merge(
    summary: PullRequestRecord,
    detail: PullRequestRecord,
    statuses: Vec<RawStatus>,
    threads: &[CommentThread],
) -> Result<PullRequest, TransportError> {
    let record = summary.overlay(detail);
    let id = record.pull_request_id;
    let missing = |field: &str| TransportError::Malformed(format!("pull request {id} has no {field}"));

    let merge_status = normalize_merge_status(record.merge_status.as_ref());
    Ok(PullRequest {
        id,
        title: record.title.ok_or_else(|| missing("title"))?,
        created_by: record.created_by.ok_or_else(|| missing("createdBy"))?.into(),
        created: record.creation_date.ok_or_else(|| missing("creationDate"))?,
        source_branch: record.source_ref_name.ok_or_else(|| missing("sourceRefName"))?,
        target_branch: record.target_ref_name.ok_or_else(|| missing("targetRefName"))?,
        repository: record.repository.into(),
        is_draft: record.is_draft.unwrap_or(false),
        has_merge_conflicts: merge_status == Some(MergeStatus::Conflicts),
        merge_status,
        reviewers: record
            .reviewers
            .unwrap_or_default()
            .into_iter()
            .map(Reviewer::from)
            .collect(),
        unresolved_comments: count_unresolved(threads),
        statuses: collapse_statuses(statuses),
        auto_complete: record.auto_complete_set_by.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StatusState;
    use crate::transport::types::ThreadStatus;
    use crate::transport::FixtureTransport;
    use std::time::Duration;

    fn summary_json(id: u64, repo: &str) -> serde_json::Value {
        serde_json::json!({
            "pullRequestId": id,
            "repository": {"id": repo, "name": repo},
            "title": format!("PR {id}"),
            "createdBy": {"id": "u1", "displayName": "User One"},
            "creationDate": "2016-06-12T08:30:00Z",
            "sourceRefName": "refs/heads/feature",
            "targetRefName": "refs/heads/master"
        })
    }

    fn fixture(pull_requests: Vec<serde_json::Value>) -> FixtureTransport {
        let document = serde_json::json!({
            "default_project": "Contoso",
            "current_user": {"id": "u1", "display_name": "User One", "unique_name": "CORP\\u1"},
            "pull_requests": pull_requests
        });
        FixtureTransport::new(serde_json::from_value(document).unwrap())
    }

    fn entry(id: u64) -> serde_json::Value {
        serde_json::json!({"project": "Contoso", "summary": summary_json(id, "r1")})
    }

    fn thread(status: Option<ThreadStatus>) -> CommentThread {
        CommentThread { status }
    }

    fn record(value: serde_json::Value) -> PullRequestRecord {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let transport = fixture(vec![]);
        let prs = PullRequestAggregator::new(&transport)
            .list_pull_requests(Scope::DefaultProject)
            .await
            .unwrap();
        assert!(prs.is_empty());
        assert_eq!(transport.calls("get_pull_request_detail"), 0);
    }

    #[tokio::test]
    async fn test_each_pull_request_is_enriched_three_ways() {
        let transport = fixture(vec![entry(1), entry(2), entry(3)]);
        let prs = PullRequestAggregator::new(&transport)
            .list_pull_requests(Scope::DefaultProject)
            .await
            .unwrap();
        assert_eq!(prs.len(), 3);
        assert_eq!(transport.calls("get_pull_request_detail"), 3);
        assert_eq!(transport.calls("get_pull_request_statuses"), 3);
        assert_eq!(transport.calls("get_pull_request_threads"), 3);
    }

    #[tokio::test]
    async fn test_statuses_and_threads_are_merged() {
        let transport = fixture(vec![serde_json::json!({
            "project": "Contoso",
            "summary": summary_json(1, "r1"),
            "detail": {"pullRequestId": 1, "repository": {"id": "r1"}, "mergeStatus": "conflicts"},
            "statuses": [
                {"context": {"name": "build"}, "state": null},
                {"context": {"name": "build"}, "state": "failed"}
            ],
            "threads": [{"status": "active"}, {"status": "closed"}, {"status": "active"}]
        })]);
        let prs = PullRequestAggregator::new(&transport)
            .list_pull_requests(Scope::DefaultProject)
            .await
            .unwrap();
        let pr = &prs[0];
        assert_eq!(pr.statuses.len(), 1);
        assert_eq!(pr.statuses[0].context.name, "build");
        assert_eq!(pr.statuses[0].state, StatusState::Failed);
        assert_eq!(pr.unresolved_comments, 2);
        assert_eq!(pr.merge_status, Some(MergeStatus::Conflicts));
        assert!(pr.has_merge_conflicts);
    }

    #[tokio::test]
    async fn test_order_survives_out_of_order_completion() {
        let transport = fixture(vec![entry(1), entry(2), entry(3)])
            .delay_detail(1, Duration::from_millis(50))
            .delay_detail(2, Duration::from_millis(20));
        let prs = PullRequestAggregator::new(&transport)
            .list_pull_requests(Scope::DefaultProject)
            .await
            .unwrap();
        let ids: Vec<u64> = prs.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failed_status_fetch_fails_batch() {
        let transport = fixture(vec![entry(1), entry(2)]).failing_on("get_pull_request_statuses");
        let err = PullRequestAggregator::new(&transport)
            .list_pull_requests(Scope::DefaultProject)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_failed_detail_fetch_fails_batch() {
        let transport = fixture(vec![entry(1), entry(2)]).failing_on("get_pull_request_detail");
        let err = PullRequestAggregator::new(&transport)
            .list_pull_requests(Scope::DefaultProject)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_failed_thread_fetch_fails_batch() {
        let transport = fixture(vec![entry(1)]).failing_on("get_pull_request_threads");
        let result = PullRequestAggregator::new(&transport)
            .list_pull_requests(Scope::DefaultProject)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_failed_listing_issues_no_enrichment() {
        let transport = fixture(vec![entry(1)]).failing_on("list_active_pull_requests");
        assert!(PullRequestAggregator::new(&transport)
            .list_pull_requests(Scope::DefaultProject)
            .await
            .is_err());
        assert_eq!(transport.calls("get_pull_request_detail"), 0);
    }

    #[test]
    fn test_count_unresolved_is_case_sensitive() {
        let threads = vec![
            thread(Some(ThreadStatus::Token("active".to_string()))),
            thread(Some(ThreadStatus::Token("Active".to_string()))),
            thread(Some(ThreadStatus::Code(1))),
            thread(Some(ThreadStatus::Token("fixed".to_string()))),
            thread(None),
        ];
        assert_eq!(count_unresolved(&threads), 2);
        assert_eq!(count_unresolved(&[]), 0);
    }

    #[test]
    fn test_merge_detail_wins_and_unset_merge_status() {
        let summary = record(summary_json(5, "r1"));
        let detail = record(serde_json::json!({
            "pullRequestId": 5,
            "repository": {"id": "r1"},
            "title": "Renamed",
            "isDraft": true,
            "autoCompleteSetBy": {"id": "u1"}
        }));
        let pr = merge(summary, detail, vec![], &[]).unwrap();
        assert_eq!(pr.title, "Renamed");
        assert!(pr.is_draft);
        assert!(pr.auto_complete);
        assert_eq!(pr.merge_status, None);
        assert!(!pr.has_merge_conflicts);
        assert_eq!(pr.repository.name.as_deref(), Some("r1"));
        assert_eq!(pr.created_by.display_name, "User One");
    }

    #[test]
    fn test_merge_extension_codes() {
        let summary = record(summary_json(5, "r1"));
        let detail = record(serde_json::json!({
            "pullRequestId": 5,
            "repository": {"id": "r1"},
            "mergeStatus": 1,
            "reviewers": [{"id": "u2", "displayName": "User Two", "vote": 10}]
        }));
        let pr = merge(summary, detail, vec![], &[]).unwrap();
        assert_eq!(pr.merge_status, Some(MergeStatus::Queued));
        assert_eq!(pr.reviewers.len(), 1);
        assert_eq!(pr.reviewers[0].vote, crate::model::Vote::Approved);
    }

    #[test]
    fn test_merge_missing_required_field_is_malformed() {
        let summary = record(serde_json::json!({"pullRequestId": 9, "repository": {"id": "r1"}}));
        let detail = summary.clone();
        let err = merge(summary, detail, vec![], &[]).unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
    }
}
