//! Submission flow from ingress to score: ingress, dispatch, scoring, and the recovery
//! sweep for requests that never got a verdict.

pub mod dispatch;
pub mod ingress;
pub mod recovery;
pub mod scoring;

pub use dispatch::{DispatchError, GradingDispatcher};
pub use ingress::{IngressError, SubmissionIngress, SubmitCommand};
pub use recovery::{SweepReport, run_pending_sweep, sweep_once};
pub use scoring::{ContestScoreAggregator, ScoreChange, ScoringError};
