use std::sync::Arc;

use mq::Channel;

use crate::config::AppConfig;
use crate::live::NotificationHub;
use crate::storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub channel: Arc<dyn Channel>,
    pub hub: Arc<NotificationHub>,
    pub config: AppConfig,
}
