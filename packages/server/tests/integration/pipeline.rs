use std::time::Duration;

use judge_server::live::PushEvent;
use serde_json::json;

use crate::common::{TestApp, routes};

mod verdicts {
    use super::*;

    #[tokio::test]
    async fn accepted_verdict_counts_once_and_is_pushed() {
        let app = TestApp::spawn().await;
        let problem = app.create_problem(10).await;
        let token = app.token(1);
        let mut session = app.hub.connect(1);

        let id = app.create_submission(problem.id, &token).await;
        app.publish_verdict(id, "Accepted", 10, 10).await;

        let submission = app.wait_for_verdict(id, &token).await;
        assert_eq!(submission["status"], "Accepted");
        assert_eq!(submission["passed"], 10);
        assert_eq!(submission["total"], 10);
        assert_eq!(submission["time_ms"], 15);
        assert_eq!(submission["memory_kb"], 2048);
        assert!(submission["judged_at"].is_string());

        let res = app
            .get_with_token(&routes::problem(problem.id), &token)
            .await;
        assert_eq!(res.body["accepted_count"], 1);
        assert_eq!(res.body["submission_count"], 1);

        let event = tokio::time::timeout(Duration::from_secs(2), session.events.recv())
            .await
            .expect("no live event")
            .unwrap();
        match event {
            PushEvent::SubmissionUpdate(pushed) => {
                assert_eq!(pushed.id, id);
                assert_eq!(pushed.status.as_str(), "Accepted");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn repeated_verdicts_leave_state_unchanged() {
        let app = TestApp::spawn().await;
        let problem = app.create_problem(10).await;
        let token = app.token(1);
        let id = app.create_submission(problem.id, &token).await;
        let sentinel = app.create_submission(problem.id, &token).await;

        app.publish_verdict(id, "Accepted", 10, 10).await;
        let first = app.wait_for_verdict(id, &token).await;

        // Redelivery of the same verdict, then a late conflicting one. The consumer
        // handles one message at a time, so once the sentinel is final both were seen.
        app.publish_verdict(id, "Accepted", 10, 10).await;
        app.publish_verdict(id, "WrongAnswer", 2, 10).await;
        app.publish_verdict(sentinel, "WrongAnswer", 2, 10).await;
        app.wait_for_verdict(sentinel, &token).await;

        let again = app
            .get_with_token(&routes::submission(id), &token)
            .await
            .body;
        assert_eq!(first, again);

        let res = app
            .get_with_token(&routes::problem(problem.id), &token)
            .await;
        assert_eq!(res.body["accepted_count"], 1);
        assert_eq!(res.body["submission_count"], 2);
    }

    #[tokio::test]
    async fn concurrent_accepts_each_count_once() {
        let app = TestApp::spawn().await;
        let problem = app.create_problem(10).await;
        let token = app.token(1);

        let (a, b) = tokio::join!(
            app.create_submission(problem.id, &token),
            app.create_submission(problem.id, &token),
        );
        tokio::join!(
            app.publish_verdict(a, "Accepted", 10, 10),
            app.publish_verdict(b, "Accepted", 10, 10),
        );
        app.wait_for_verdict(a, &token).await;
        app.wait_for_verdict(b, &token).await;

        let res = app
            .get_with_token(&routes::problem(problem.id), &token)
            .await;
        assert_eq!(res.body["accepted_count"], 2);
        assert_eq!(res.body["submission_count"], 2);
    }

    #[tokio::test]
    async fn unknown_submission_is_dropped_and_consumer_keeps_running() {
        let app = TestApp::spawn().await;
        let problem = app.create_problem(10).await;
        let token = app.token(1);
        let id = app.create_submission(problem.id, &token).await;

        app.publish_verdict(9999, "Accepted", 10, 10).await;
        app.publish_verdict(id, "WrongAnswer", 3, 10).await;

        let submission = app.wait_for_verdict(id, &token).await;
        assert_eq!(submission["status"], "WrongAnswer");

        let res = app
            .get_with_token(&routes::problem(problem.id), &token)
            .await;
        assert_eq!(res.body["accepted_count"], 0);
    }

    #[tokio::test]
    async fn malformed_verdicts_are_dropped() {
        let app = TestApp::spawn().await;
        let problem = app.create_problem(10).await;
        let token = app.token(1);
        let id = app.create_submission(problem.id, &token).await;

        app.publish_raw_verdict(json!({ "submissionId": id, "overallVerdict": "Accepted" }))
            .await;
        app.publish_raw_verdict(json!("garbage")).await;
        app.publish_verdict(id, "Accepted", 12, 10).await;
        app.publish_verdict(id, "TimeLimitExceeded", 4, 10).await;

        let submission = app.wait_for_verdict(id, &token).await;
        assert_eq!(submission["status"], "TimeLimitExceeded");
        assert_eq!(submission["passed"], 4);
    }

    #[tokio::test]
    async fn unrecognized_verdict_is_internal_error() {
        let app = TestApp::spawn().await;
        let problem = app.create_problem(10).await;
        let token = app.token(1);
        let id = app.create_submission(problem.id, &token).await;

        app.publish_verdict(id, "OutputLimitExceeded", 0, 10).await;

        let submission = app.wait_for_verdict(id, &token).await;
        assert_eq!(submission["status"], "InternalError");
    }

    #[tokio::test]
    async fn judging_progress_is_visible_before_verdict() {
        let app = TestApp::spawn().await;
        let problem = app.create_problem(10).await;
        let token = app.token(1);
        let id = app.create_submission(problem.id, &token).await;
        let sentinel = app.create_submission(problem.id, &token).await;

        app.publish_verdict(id, "Judging", 0, 0).await;
        app.publish_verdict(sentinel, "Accepted", 10, 10).await;
        app.wait_for_verdict(sentinel, &token).await;

        let res = app.get_with_token(&routes::submission(id), &token).await;
        assert_eq!(res.body["status"], "Judging");

        app.publish_verdict(id, "RuntimeError", 1, 10).await;
        let submission = app.wait_for_verdict(id, &token).await;
        assert_eq!(submission["status"], "RuntimeError");
    }
}
