pub mod broccoli;
pub mod channel;
pub mod error;
pub mod memory;

use std::sync::Arc;

use common::{MqAppConfig, MqBackend};
use tracing::info;

pub use broccoli::BroccoliChannel;
pub use channel::{Channel, Delivery, Handler, handler};
pub use error::{HandlerError, MqError};
pub use memory::MemoryChannel;

/// Build the channel selected by `config.backend`.
pub async fn connect(config: &MqAppConfig) -> Result<Arc<dyn Channel>, MqError> {
    match config.backend {
        MqBackend::Redis => {
            let channel = BroccoliChannel::connect(&config.url, config.pool_size).await?;
            Ok(Arc::new(channel))
        }
        MqBackend::Memory => {
            info!("Using in-memory channel");
            Ok(Arc::new(MemoryChannel::new()))
        }
    }
}
