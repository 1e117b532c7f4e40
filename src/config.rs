use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context as _;
use parking_lot::RwLock;

/// What a name tag shows next to the player's name.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Statistic {
    #[default]
    Tier,
    Rank,
}

impl FromStr for Statistic {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match &*input.trim().to_ascii_lowercase() {
            "tier" => Ok(Self::Tier),
            "rank" => Ok(Self::Rank),
            s => anyhow::bail!("expected 'tier' or 'rank', got '{s}'"),
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tier => "tier",
            Self::Rank => "rank",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub user_agent: String,
    pub show_retired: bool,
    pub show_region: bool,
    pub statistic: Statistic,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: String::from("https://mctiers.com/api"),
            user_agent: String::from(crate::USER_AGENT),
            show_retired: true,
            show_region: true,
            statistic: Statistic::Tier,
            cache_ttl: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub const API_URL: &'static str = "TIERTAGGER_API_URL";
    pub const USER_AGENT: &'static str = "TIERTAGGER_USER_AGENT";
    pub const SHOW_RETIRED: &'static str = "TIERTAGGER_SHOW_RETIRED";
    pub const SHOW_REGION: &'static str = "TIERTAGGER_SHOW_REGION";
    pub const STATISTIC: &'static str = "TIERTAGGER_STATISTIC";
    pub const CACHE_TTL: &'static str = "TIERTAGGER_CACHE_TTL_SECS";
    pub const TIMEOUT: &'static str = "TIERTAGGER_TIMEOUT_SECS";

    pub fn from_env() -> anyhow::Result<Self> {
        simple_env_load::load_env_from([".env", ".dev.env"]);
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut this = Self::default();

        if let Some(url) = var(Self::API_URL).filter(|s| !s.trim().is_empty()) {
            this.api_url = url.trim().to_string();
        }

        if let Some(agent) = var(Self::USER_AGENT).filter(|s| !s.trim().is_empty()) {
            this.user_agent = agent.trim().to_string();
        }

        if let Some(flag) = var(Self::SHOW_RETIRED) {
            this.show_retired = parse_bool(&flag)
                .with_context(|| format!("invalid value for {}", Self::SHOW_RETIRED))?;
        }

        if let Some(flag) = var(Self::SHOW_REGION) {
            this.show_region = parse_bool(&flag)
                .with_context(|| format!("invalid value for {}", Self::SHOW_REGION))?;
        }

        if let Some(stat) = var(Self::STATISTIC) {
            this.statistic = stat
                .parse()
                .with_context(|| format!("invalid value for {}", Self::STATISTIC))?;
        }

        if let Some(secs) = var(Self::CACHE_TTL) {
            this.cache_ttl = parse_secs(&secs)
                .with_context(|| format!("invalid value for {}", Self::CACHE_TTL))?;
        }

        if let Some(secs) = var(Self::TIMEOUT) {
            this.request_timeout = parse_secs(&secs)
                .with_context(|| format!("invalid value for {}", Self::TIMEOUT))?;
        }

        Ok(this)
    }
}

fn parse_bool(input: &str) -> anyhow::Result<bool> {
    match &*input.trim().to_ascii_lowercase() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        s => anyhow::bail!("expected a boolean, got '{s}'"),
    }
}

fn parse_secs(input: &str) -> anyhow::Result<Duration> {
    let secs = input
        .trim()
        .parse::<u64>()
        .map_err(|err| anyhow::anyhow!("expected seconds, got '{input}': {err}"))?;
    Ok(Duration::from_secs(secs))
}

/// Shared handle to the live configuration.
///
/// Readers see the value as it is at the time of the call, so changes made
/// through [`Settings::update`] apply to the next request.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    inner: Arc<RwLock<Config>>,
}

impl Settings {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn get(&self) -> Config {
        self.inner.read().clone()
    }

    pub fn api_url(&self) -> String {
        self.inner.read().api_url.clone()
    }

    pub fn user_agent(&self) -> String {
        self.inner.read().user_agent.clone()
    }

    pub fn show_retired(&self) -> bool {
        self.inner.read().show_retired
    }

    pub fn update(&self, func: impl FnOnce(&mut Config)) {
        func(&mut *self.inner.write())
    }
}
