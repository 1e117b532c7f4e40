mod api;
pub use api::{Client, FetchError, ProfileSource, USER_AGENT};

mod config;
pub use config::{Config, Settings, Statistic};

mod player;
pub use player::{Badge, PlayerInfo, PointTier, Ranking, Region, TierLabel};

mod player_cache;
pub use player_cache::PlayerCache;

mod repaint;
pub use repaint::Repaint;

pub mod runtime;
