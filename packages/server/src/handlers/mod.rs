pub mod contest;
pub mod live;
pub mod problem;
pub mod submission;
