pub mod contest;
pub mod contest_participation;
pub mod contest_problem;
pub mod problem;
pub mod submission;
