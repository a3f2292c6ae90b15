use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;

/// Core trait for all messages carried by the grading channel.
pub trait Message: Serialize + DeserializeOwned + Debug + Send + Sync + Clone {
    fn message_type() -> &'static str
    where
        Self: Sized;

    /// Key used to group messages that concern the same entity.
    fn message_key(&self) -> String;
}
