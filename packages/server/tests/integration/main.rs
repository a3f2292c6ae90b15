mod common;
mod contest;
mod pipeline;
