pub mod verdict;

pub use verdict::{Disposition, VerdictProcessor, consume_verdicts};
