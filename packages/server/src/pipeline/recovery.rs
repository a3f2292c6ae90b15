use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::RecoveryConfig;
use crate::live::{NotificationHub, PushEvent};
use crate::models::submission::{ApplyOutcome, Submission, VerdictUpdate};
use crate::state::AppState;
use crate::storage::{Storage, StorageError};

use super::dispatch::GradingDispatcher;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub redispatched: usize,
    /// Forced to `InternalError`.
    pub failed: usize,
}

/// Run the pending sweep as a background task.
pub async fn run_pending_sweep(state: AppState) {
    let config = state.config.recovery.clone();
    let dispatcher = GradingDispatcher::from_state(&state);

    info!(
        pending_timeout_secs = config.pending_timeout_secs,
        scan_interval_secs = config.scan_interval_secs,
        max_redispatch = config.max_redispatch,
        "Starting pending submission sweep"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.scan_interval_secs));

    loop {
        interval.tick().await;

        match sweep_once(&state.storage, &dispatcher, &state.hub, &config).await {
            Ok(report) if report != SweepReport::default() => {
                info!(
                    redispatched = report.redispatched,
                    failed = report.failed,
                    "Pending sweep finished"
                );
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "Pending sweep failed"),
        }
    }
}

/// Re-dispatch every submission that has sat in `Pending` past the timeout.
///
/// A submission that has used up its dispatches, or whose problem is gone, is resolved
/// to `InternalError` instead.
pub async fn sweep_once(
    storage: &Arc<dyn Storage>,
    dispatcher: &GradingDispatcher,
    hub: &NotificationHub,
    config: &RecoveryConfig,
) -> Result<SweepReport, StorageError> {
    let threshold = Utc::now() - chrono::Duration::seconds(config.pending_timeout_secs as i64);
    let stale = storage
        .list_stale_pending(threshold, config.batch_size)
        .await?;

    let mut report = SweepReport::default();
    if stale.is_empty() {
        return Ok(report);
    }

    info!(count = stale.len(), "Found stale pending submissions");

    for submission in stale {
        match recover(storage, dispatcher, hub, config, &submission).await {
            Ok(Recovered::Redispatched) => report.redispatched += 1,
            Ok(Recovered::Failed) => report.failed += 1,
            Ok(Recovered::Skipped) => {}
            Err(e) => error!(
                submission_id = submission.id,
                error = %e,
                "Failed to recover pending submission"
            ),
        }
    }

    Ok(report)
}

enum Recovered {
    Redispatched,
    Failed,
    Skipped,
}

async fn recover(
    storage: &Arc<dyn Storage>,
    dispatcher: &GradingDispatcher,
    hub: &NotificationHub,
    config: &RecoveryConfig,
    submission: &Submission,
) -> anyhow::Result<Recovered> {
    if submission.dispatch_count >= config.max_redispatch {
        warn!(
            submission_id = submission.id,
            dispatch_count = submission.dispatch_count,
            "Submission never graded, resolving as internal error"
        );
        return force_internal_error(storage, hub, submission.id).await;
    }

    let Some(problem) = storage.find_problem(submission.problem_id).await? else {
        warn!(
            submission_id = submission.id,
            problem_id = submission.problem_id,
            "Problem missing for pending submission, resolving as internal error"
        );
        return force_internal_error(storage, hub, submission.id).await;
    };

    dispatcher.dispatch(submission, &problem).await?;
    info!(
        submission_id = submission.id,
        attempt = submission.dispatch_count + 1,
        "Re-dispatched pending submission"
    );
    Ok(Recovered::Redispatched)
}

async fn force_internal_error(
    storage: &Arc<dyn Storage>,
    hub: &NotificationHub,
    submission_id: i32,
) -> anyhow::Result<Recovered> {
    match storage
        .apply_verdict(submission_id, VerdictUpdate::internal_error(Utc::now()))
        .await?
    {
        ApplyOutcome::Applied { submission, .. } => {
            hub.push_to_user(submission.user_id, PushEvent::SubmissionUpdate(submission));
            Ok(Recovered::Failed)
        }
        // A verdict landed between the scan and now.
        ApplyOutcome::AlreadyFinal(_) | ApplyOutcome::NotFound => Ok(Recovered::Skipped),
    }
}
