use std::future::Future;

use uuid::Uuid;

use loft_types::api::TrackingStatus;

/// How the poller asks after one message. Production goes over HTTP;
/// poller tests use scripted implementations.
pub trait TrackingApi: Send + Sync + 'static {
    fn status(&self, id: Uuid) -> impl Future<Output = anyhow::Result<TrackingStatus>> + Send;
}

/// Queries `GET /tracking/status/{id}` on the configured server. Non-2xx
/// responses, the 404 for unknown ids included, surface as errors.
pub struct HttpTrackingApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTrackingApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpTrackingApi {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl TrackingApi for HttpTrackingApi {
    async fn status(&self, id: Uuid) -> anyhow::Result<TrackingStatus> {
        let url = format!(
            "{}/tracking/status/{}",
            self.base_url.trim_end_matches('/'),
            id
        );
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}
