use chrono::{Duration, Utc};

use crate::common::{TestApp, routes};

/// A contest that started an hour ago and ends in an hour, with one 100-point problem
/// of ten test cases. Returns `(contest_id, problem_id)`.
async fn running_contest(app: &TestApp) -> (i32, i32) {
    let problem = app.create_problem(10).await;
    let now = Utc::now();
    let contest = app
        .create_contest(
            &[(problem.id, 100.0)],
            now - Duration::hours(1),
            now + Duration::hours(1),
        )
        .await;
    (contest.id, problem.id)
}

async fn ended_contest(app: &TestApp) -> (i32, i32) {
    let problem = app.create_problem(10).await;
    let now = Utc::now();
    let contest = app
        .create_contest(
            &[(problem.id, 100.0)],
            now - Duration::hours(3),
            now - Duration::hours(1),
        )
        .await;
    (contest.id, problem.id)
}

mod registration {
    use super::*;

    #[tokio::test]
    async fn official_registration_uses_contest_window() {
        let app = TestApp::spawn().await;
        let (contest_id, _) = running_contest(&app).await;
        let token = app.token(1);

        let res = app
            .register_for_contest(contest_id, "official", &token)
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["mode"], "official");
        assert_eq!(res.body["contest_id"], contest_id);
        assert_eq!(res.body["total_score"], 0.0);
        assert!(res.body["problems"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_official_registration_conflicts() {
        let app = TestApp::spawn().await;
        let (contest_id, _) = running_contest(&app).await;
        let token = app.token(1);

        app.register_for_contest(contest_id, "official", &token)
            .await;
        let res = app
            .register_for_contest(contest_id, "official", &token)
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn virtual_registration_requires_ended_contest() {
        let app = TestApp::spawn().await;
        let (contest_id, _) = running_contest(&app).await;

        let res = app
            .register_for_contest(contest_id, "virtual", &app.token(1))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn official_registration_closes_when_contest_ends() {
        let app = TestApp::spawn().await;
        let (contest_id, _) = ended_contest(&app).await;

        let res = app
            .register_for_contest(contest_id, "official", &app.token(1))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn virtual_registration_is_repeatable() {
        let app = TestApp::spawn().await;
        let (contest_id, _) = ended_contest(&app).await;
        let token = app.token(1);

        let first = app
            .register_for_contest(contest_id, "virtual", &token)
            .await;
        let second = app
            .register_for_contest(contest_id, "virtual", &token)
            .await;

        assert_eq!(first.status, 201);
        assert_eq!(second.status, 201);
        assert_ne!(first.id(), second.id());

        let latest = app
            .get_with_token(&routes::contest_participation(contest_id), &token)
            .await;
        assert_eq!(latest.status, 200);
        assert_eq!(latest.id(), second.id());
    }

    #[tokio::test]
    async fn unknown_contest_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app
            .register_for_contest(404, "official", &app.token(1))
            .await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn participation_requires_registration() {
        let app = TestApp::spawn().await;
        let (contest_id, _) = running_contest(&app).await;

        let res = app
            .get_with_token(&routes::contest_participation(contest_id), &app.token(1))
            .await;

        assert_eq!(res.status, 404);
    }
}

mod contest_submissions {
    use super::*;

    #[tokio::test]
    async fn unregistered_user_cannot_submit() {
        let app = TestApp::spawn().await;
        let (contest_id, problem_id) = running_contest(&app).await;

        let res = app
            .post_with_token(
                &routes::contest_problem_submissions(contest_id, problem_id),
                &serde_json::json!({ "source": "code", "language": "cpp" }),
                &app.token(1),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn problem_outside_contest_is_not_found() {
        let app = TestApp::spawn().await;
        let (contest_id, _) = running_contest(&app).await;
        let outside = app.create_problem(10).await;
        let token = app.token(1);
        app.register_for_contest(contest_id, "official", &token)
            .await;

        let res = app
            .post_with_token(
                &routes::contest_problem_submissions(contest_id, outside.id),
                &serde_json::json!({ "source": "code", "language": "cpp" }),
                &token,
            )
            .await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn partial_verdict_scores_proportionally() {
        let app = TestApp::spawn().await;
        let (contest_id, problem_id) = running_contest(&app).await;
        let token = app.token(1);
        app.register_for_contest(contest_id, "official", &token)
            .await;

        let id = app
            .create_contest_submission(contest_id, problem_id, &token)
            .await;
        app.publish_verdict(id, "WrongAnswer", 7, 10).await;

        let submission = app.wait_for_verdict(id, &token).await;
        assert_eq!(submission["kind"], "official_contest");
        assert_eq!(submission["score"], 70.0);

        let record = app
            .get_with_token(&routes::contest_participation(contest_id), &token)
            .await
            .body;
        assert_eq!(record["total_score"], 70.0);
        assert_eq!(record["problems"][0]["problem_id"], problem_id);
        assert_eq!(record["problems"][0]["best_score"], 70.0);
        assert_eq!(record["problems"][0]["attempts"], 1);
        assert_eq!(record["problems"][0]["best_submission_id"], id);
    }

    #[tokio::test]
    async fn lower_resubmission_keeps_best_score() {
        let app = TestApp::spawn().await;
        let (contest_id, problem_id) = running_contest(&app).await;
        let token = app.token(1);
        app.register_for_contest(contest_id, "official", &token)
            .await;

        let first = app
            .create_contest_submission(contest_id, problem_id, &token)
            .await;
        app.publish_verdict(first, "WrongAnswer", 7, 10).await;
        app.wait_for_verdict(first, &token).await;

        let second = app
            .create_contest_submission(contest_id, problem_id, &token)
            .await;
        app.publish_verdict(second, "WrongAnswer", 5, 10).await;
        let submission = app.wait_for_verdict(second, &token).await;
        assert_eq!(submission["score"], 50.0);

        let record = app
            .get_with_token(&routes::contest_participation(contest_id), &token)
            .await
            .body;
        let entry = &record["problems"][0];
        assert_eq!(entry["best_score"], 70.0);
        assert_eq!(entry["attempts"], 2);
        assert_eq!(entry["best_submission_id"], first);
        assert_eq!(record["total_score"], 70.0);
    }

    #[tokio::test]
    async fn best_score_is_the_maximum_in_any_order() {
        let app = TestApp::spawn().await;
        let (contest_id, problem_id) = running_contest(&app).await;
        let token = app.token(1);
        app.register_for_contest(contest_id, "official", &token)
            .await;

        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(
                app.create_contest_submission(contest_id, problem_id, &token)
                    .await,
            );
        }
        // Verdicts arrive in a different order than the submissions were made.
        for (&id, passed) in ids.iter().rev().zip([3, 9, 6, 9]) {
            app.publish_verdict(id, "WrongAnswer", passed, 10).await;
        }
        for &id in &ids {
            app.wait_for_verdict(id, &token).await;
        }

        let record = app
            .get_with_token(&routes::contest_participation(contest_id), &token)
            .await
            .body;
        let entry = &record["problems"][0];
        assert_eq!(entry["best_score"], 90.0);
        assert_eq!(entry["attempts"], 4);
    }

    #[tokio::test]
    async fn virtual_run_scores_separately() {
        let app = TestApp::spawn().await;
        let (contest_id, problem_id) = ended_contest(&app).await;
        let token = app.token(1);
        let run = app
            .register_for_contest(contest_id, "virtual", &token)
            .await;

        let id = app
            .create_contest_submission(contest_id, problem_id, &token)
            .await;
        app.publish_verdict(id, "Accepted", 10, 10).await;

        let submission = app.wait_for_verdict(id, &token).await;
        assert_eq!(submission["kind"], "virtual_contest");
        assert_eq!(submission["participation_id"], run.id());
        assert_eq!(submission["score"], 100.0);

        let record = app
            .get_with_token(&routes::contest_participation(contest_id), &token)
            .await
            .body;
        assert_eq!(record["mode"], "virtual");
        assert_eq!(record["total_score"], 100.0);
    }
}

mod scoreboard {
    use super::*;

    #[tokio::test]
    async fn ranks_by_total_then_earliest_improvement() {
        let app = TestApp::spawn().await;
        let (contest_id, problem_id) = running_contest(&app).await;
        let (alice, bob, carol) = (app.token(1), app.token(2), app.token(3));
        for token in [&alice, &bob, &carol] {
            app.register_for_contest(contest_id, "official", token)
                .await;
        }

        let a = app
            .create_contest_submission(contest_id, problem_id, &alice)
            .await;
        let b = app
            .create_contest_submission(contest_id, problem_id, &bob)
            .await;
        app.publish_verdict(a, "WrongAnswer", 5, 10).await;
        app.publish_verdict(b, "Accepted", 10, 10).await;
        app.wait_for_verdict(a, &alice).await;
        app.wait_for_verdict(b, &bob).await;

        let res = app
            .get_with_token(&routes::contest_scoreboard(contest_id), &carol)
            .await;
        assert_eq!(res.status, 200);

        let rows = res.body.as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["user_id"], 2);
        assert_eq!(rows[0]["rank"], 1);
        assert_eq!(rows[0]["total_score"], 100.0);
        assert_eq!(rows[1]["user_id"], 1);
        assert_eq!(rows[1]["rank"], 2);
        assert_eq!(rows[2]["user_id"], 3);
        assert_eq!(rows[2]["rank"], 3);
    }

    #[tokio::test]
    async fn virtual_rows_are_opt_in() {
        let app = TestApp::spawn().await;
        let (contest_id, _) = ended_contest(&app).await;
        app.register_for_contest(contest_id, "virtual", &app.token(1))
            .await;

        let token = app.token(2);
        let official_only = app
            .get_with_token(&routes::contest_scoreboard(contest_id), &token)
            .await;
        assert!(official_only.body.as_array().unwrap().is_empty());

        let with_virtual = app
            .get_with_token(
                &format!(
                    "{}?include_virtual=true",
                    routes::contest_scoreboard(contest_id)
                ),
                &token,
            )
            .await;
        let rows = with_virtual.body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["mode"], "virtual");
    }

    #[tokio::test]
    async fn room_members_receive_scoreboard_updates() {
        let app = TestApp::spawn().await;
        let (contest_id, problem_id) = running_contest(&app).await;
        let token = app.token(1);
        app.register_for_contest(contest_id, "official", &token)
            .await;

        let mut viewer = app.hub.connect(9);
        assert!(app.hub.join_room(contest_id, viewer.id));

        let id = app
            .create_contest_submission(contest_id, problem_id, &token)
            .await;
        app.publish_verdict(id, "WrongAnswer", 4, 10).await;
        app.wait_for_verdict(id, &token).await;

        let event = tokio::time::timeout(std::time::Duration::from_secs(2), viewer.events.recv())
            .await
            .expect("no scoreboard event")
            .unwrap();
        let frame = serde_json::to_value(&event).unwrap();
        assert_eq!(frame["event"], "scoreboard-update");
        assert_eq!(frame["data"]["contest_id"], contest_id);
        assert_eq!(frame["data"]["user_id"], 1);
        assert_eq!(frame["data"]["best_score"], 40.0);
        assert_eq!(frame["data"]["attempts"], 1);
    }
}
