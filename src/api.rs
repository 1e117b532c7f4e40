use reqwest::{StatusCode, Url};
use uuid::Uuid;

use crate::{PlayerInfo, Settings};

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("cannot decode profile: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no such player")]
    NotFound,
    #[error("invalid api url: {0}")]
    InvalidUrl(String),
}

/// Where player profiles come from.
#[async_trait::async_trait]
pub trait ProfileSource: Send + Sync + 'static {
    async fn profile(&self, id: Uuid) -> Result<PlayerInfo, FetchError>;
    async fn search(&self, query: &str) -> Result<PlayerInfo, FetchError>;
}

#[derive(Clone)]
pub struct Client {
    client: reqwest::Client,
    settings: Settings,
}

impl Client {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(settings.get().request_timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    pub async fn get_profile(&self, id: Uuid) -> Result<PlayerInfo, FetchError> {
        let id = id.simple().to_string();
        self.get_response(["profile", &id]).await
    }

    pub async fn search_profile(&self, query: &str) -> Result<PlayerInfo, FetchError> {
        self.get_response(["search_profile", query]).await
    }

    fn endpoint(&self, segments: [&str; 2]) -> Result<Url, FetchError> {
        let base = self.settings.api_url();
        let mut url =
            Url::parse(&base).map_err(|err| FetchError::InvalidUrl(format!("{base}: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(base.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_response(&self, segments: [&str; 2]) -> Result<PlayerInfo, FetchError> {
        let url = self.endpoint(segments)?;
        let user_agent = self.settings.user_agent();
        tracing::debug!(%url, %user_agent, "requesting profile");

        let resp = self
            .client
            .get(url)
            .header("user-agent", user_agent)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }

        let body = resp.error_for_status()?.text().await?;
        decode(&body)
    }
}

#[async_trait::async_trait]
impl ProfileSource for Client {
    async fn profile(&self, id: Uuid) -> Result<PlayerInfo, FetchError> {
        self.get_profile(id).await
    }

    async fn search(&self, query: &str) -> Result<PlayerInfo, FetchError> {
        self.search_profile(query).await
    }
}

// well-formed json that doesn't describe a player is the api saying "nobody"
fn decode(body: &str) -> Result<PlayerInfo, FetchError> {
    match serde_json::from_str(body) {
        Ok(info) => Ok(info),
        Err(err) if err.is_data() && !describes_player(body) => Err(FetchError::NotFound),
        Err(err) => Err(FetchError::Decode(err)),
    }
}

fn describes_player(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .map(|value| value.get("uuid").is_some())
        .unwrap_or(false)
}
