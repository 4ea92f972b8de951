use crate::error::{Error, ExternalErrorKind};
use events::{ClientEvent, EventPublisher};
use log::*;
use reqwest::header::ACCEPT;
use serde_json::Value;
use url::Url;

/// One-shot JSON reader: GETs a resource and hands the parsed body to the
/// logging sink. No retry, no timeout.
pub struct Fetcher {
    client: reqwest::Client,
    publisher: EventPublisher,
}

impl Fetcher {
    pub fn new(publisher: EventPublisher) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("empapp-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, publisher })
    }

    pub async fn fetch_and_log(&self, url: Url) -> Result<Value, Error> {
        info!("Fetching {url}");

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to send request to {url}: {e:?}");
                Error::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("GET {url} failed: {status} - {body}");
            return Err(Error::external(ExternalErrorKind::Other(format!(
                "Unexpected status {status}"
            ))));
        }

        let body: Value = response.json().await?;
        debug!("GET {url} returned {body}");

        self.publisher
            .publish(ClientEvent::Fetched {
                url: url.to_string(),
                body: body.clone(),
            })
            .await;

        Ok(body)
    }
}
