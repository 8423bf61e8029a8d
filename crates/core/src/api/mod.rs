//! HTTP access to the banner API.

use std::{sync::Arc, time::Duration};

use anyhow::{ensure, Context, Result};
use futures::future::BoxFuture;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    config::AppConfig,
    error::FetchError,
    models::{Envelope, GameId, HistoryResponse, StatusResponse, VersionPhase, VersionsResponse},
};

/// Source of envelopes consumed by the refresh scheduler.
pub trait DataSource: Send + Sync {
    /// Fetch the full banners envelope.
    fn fetch_envelope(&self) -> BoxFuture<'_, Result<Envelope, FetchError>>;
    /// Fetch the lightweight status payload.
    fn fetch_status(&self) -> BoxFuture<'_, Result<StatusResponse, FetchError>>;
}

/// `reqwest`-backed client for the banner API.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<Url>,
    timeout: Duration,
}

impl ApiClient {
    /// Build a client from configuration.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let timeout = config.http_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .user_agent(concat!("bannerwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        let base_url = Url::parse(config.api.base_url.trim())
            .with_context(|| format!("invalid api.base_url `{}`", config.api.base_url))?;
        ensure!(
            !base_url.cannot_be_a_base(),
            "api.base_url `{base_url}` cannot carry a path"
        );

        Ok(Self {
            client,
            base_url: Arc::new(base_url),
            timeout,
        })
    }

    /// Endpoint URL below the base; each segment is percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = Url::clone(&self.base_url);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T>(&self, segments: &[&str]) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let url = self.url(segments).to_string();
        debug!(%url, "requesting");
        let response = self.client.get(url.as_str()).send().await.map_err(|source| {
            if source.is_timeout() {
                FetchError::Timeout {
                    timeout: self.timeout,
                }
            } else {
                FetchError::Network {
                    url: url.clone(),
                    source,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Network {
                url: url.clone(),
                source,
            })?;
        serde_json::from_slice(&body).map_err(|err| FetchError::malformed(url, err))
    }

    /// Version phases of `game`, newest first.
    pub async fn versions(&self, game: GameId) -> Result<Vec<VersionPhase>, FetchError> {
        let response: VersionsResponse = self.get_json(&["versions", game.as_str()]).await?;
        if response.game_id != game {
            return Err(FetchError::malformed(
                "versions",
                format!("requested {game}, received {}", response.game_id),
            ));
        }
        Ok(response.into_phases()?)
    }

    /// Banners that ran during `phase_id`.
    pub async fn history(&self, phase_id: &str) -> Result<HistoryResponse, FetchError> {
        let response: HistoryResponse = self.get_json(&["history", phase_id]).await?;
        response.validate()?;
        Ok(response)
    }
}

impl DataSource for ApiClient {
    fn fetch_envelope(&self) -> BoxFuture<'_, Result<Envelope, FetchError>> {
        Box::pin(self.get_json::<Envelope>(&["banners"]))
    }

    fn fetch_status(&self) -> BoxFuture<'_, Result<StatusResponse, FetchError>> {
        Box::pin(self.get_json::<StatusResponse>(&["status"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> Result<ApiClient> {
        let mut config = AppConfig::default();
        config.api.base_url = base_url.to_string();
        ApiClient::new(&config)
    }

    #[test]
    fn urls_ignore_trailing_slashes() -> Result<()> {
        for base in ["https://banners.example/api/", "https://banners.example/api"] {
            let client = client(base)?;
            assert_eq!(
                client.url(&["banners"]).as_str(),
                "https://banners.example/api/banners"
            );
            assert_eq!(
                client.url(&["versions", GameId::Zzz.as_str()]).as_str(),
                "https://banners.example/api/versions/zzz"
            );
        }
        Ok(())
    }

    #[test]
    fn phase_ids_are_escaped_as_one_segment() -> Result<()> {
        let client = client("https://banners.example/api")?;
        assert_eq!(
            client.url(&["history", "5.3/2 b?x#y"]).as_str(),
            "https://banners.example/api/history/5.3%2F2%20b%3Fx%23y"
        );
        Ok(())
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(client("not a url").is_err());
        assert!(client("mailto:banners@example.com").is_err());
    }
}
