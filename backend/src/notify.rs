use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use scheduler::{LogNotifier, Notifier, SurgeNotice};
use serde::Serialize;
use tracing::{info, instrument};

use crate::config::AppConfig;

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Posts rendered notices to a chat webhook.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("building webhook http client")?;

        Ok(Self { http, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip_all, fields(artist = %notice.artist_key, event_id = %notice.event_id))]
    async fn notify(&self, notice: &SurgeNotice) -> anyhow::Result<()> {
        let text = notice.render();

        self.http
            .post(&self.url)
            .json(&WebhookPayload { content: &text })
            .send()
            .await
            .context("posting surge notice")?
            .error_for_status()
            .context("webhook rejected surge notice")?;

        Ok(())
    }
}

/// Webhook when configured, otherwise the log.
pub fn build_notifier(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match cfg.webhook_url.as_deref() {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(url.to_string())?)),
        None => {
            info!("no webhook configured; surge notices go to the log");
            Ok(Arc::new(LogNotifier))
        }
    }
}
