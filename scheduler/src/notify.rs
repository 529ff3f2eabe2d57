use async_trait::async_trait;
use tracing::info;

use crate::types::{Notifier, SurgeNotice};

/// Writes notices to the log. Used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &SurgeNotice) -> anyhow::Result<()> {
        info!(
            target: "surge_notice",
            artist = %notice.artist_key,
            event_id = %notice.event_id,
            city = notice.city.as_deref().unwrap_or(""),
            "{}",
            notice.render()
        );
        Ok(())
    }
}
