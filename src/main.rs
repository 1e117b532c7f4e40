use std::{sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use crossterm::{
    style::{Color, Stylize},
    tty::IsTty,
};
use time::macros::format_description;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use tiertagger::{
    runtime, Client, Config, PlayerCache, PlayerInfo, Settings, Statistic, TierLabel,
};

#[derive(Debug, Parser)]
#[command(name = "tiertagger", version, about = "Look up a player's tier list rankings")]
struct Args {
    /// Player name or uuid
    #[arg(required_unless_present = "list_colors")]
    player: Option<String>,

    /// Print the name tag for this game mode
    #[arg(short, long)]
    mode: Option<String>,

    /// What the name tag shows: tier or rank
    #[arg(short, long)]
    statistic: Option<Statistic>,

    /// Leave the region out of the name tag
    #[arg(long)]
    no_region: bool,

    /// Include points, overall rank and badges
    #[arg(short, long)]
    full: bool,

    /// Print the profile as json
    #[arg(long, conflicts_with = "full")]
    json: bool,

    /// Don't show peak tiers of retired rankings
    #[arg(long)]
    hide_retired: bool,

    /// Print every tier label in its color and exit
    #[arg(long, conflicts_with = "player")]
    list_colors: bool,

    /// Never color the output
    #[arg(long)]
    no_color: bool,

    /// Base url of the ranking api
    #[arg(long)]
    api_url: Option<String>,

    /// User-Agent sent with each request
    #[arg(long)]
    user_agent: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(agent) = &self.user_agent {
            config.user_agent = agent.clone();
        }
        if let Some(statistic) = self.statistic {
            config.statistic = statistic;
        }
        if self.no_region {
            config.show_region = false;
        }
        if self.hide_retired {
            config.show_retired = false;
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Paint(bool);

impl Paint {
    fn rgb(self, text: impl ToString, rgb: u32) -> String {
        let [_, r, g, b] = rgb.to_be_bytes();
        self.with(text, Color::Rgb { r, g, b })
    }

    fn with(self, text: impl ToString, color: Color) -> String {
        let text = text.to_string();
        if !self.0 {
            return text;
        }
        text.with(color).to_string()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(concat!(env!("CARGO_CRATE_NAME"), "=info")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// a uuid goes through the same path the name renderer uses, anything else is a search
fn lookup(
    cache: &PlayerCache,
    settled: &flume::Receiver<()>,
    player: &str,
    wait: Duration,
) -> anyhow::Result<Arc<PlayerInfo>> {
    if let Ok(id) = player.parse::<Uuid>() {
        if cache.get(id).is_none() {
            let _ = settled.recv_timeout(wait);
        }
        if let Some(info) = cache.peek(id) {
            return Ok(info);
        }
    }

    tracing::info!("searching for {player}...");
    let info = cache
        .search_detached(player)
        .blocking_recv()
        .context("search was dropped")?
        .with_context(|| format!("could not find player {player}"))?;
    Ok(info)
}

// "[REGION] LABEL | NAME", where LABEL is the mode's tier or the overall rank
fn name_tag(info: &PlayerInfo, mode: &str, config: &Config, paint: Paint) -> String {
    let mut tag = String::new();
    if config.show_region {
        tag.push_str(&paint.with("[", Color::Grey));
        tag.push_str(&paint.rgb(info.region, info.region.color()));
        tag.push_str(&paint.with("] ", Color::Grey));
    }

    let stat = match config.statistic {
        Statistic::Tier => info
            .ranking(mode)
            .and_then(|ranking| ranking.classify(config.show_retired))
            .map(|label| paint.rgb(label, label.color())),
        Statistic::Rank => Some(format!("#{}", info.overall)),
    };
    if let Some(stat) = stat {
        tag.push_str(&stat);
        tag.push_str(&paint.with(" | ", Color::Grey));
    }

    tag.push_str(&info.name);
    tag
}

fn tier_labels() -> impl Iterator<Item = TierLabel> {
    let labels = |retired: bool, tiers: std::ops::RangeInclusive<u32>| {
        tiers.rev().flat_map(move |tier| {
            [false, true].map(move |high| TierLabel { retired, high, tier })
        })
    };
    labels(false, 1..=5).chain(labels(true, 1..=2))
}

fn print_colors(paint: Paint) {
    println!("Tier colors:");
    for label in tier_labels() {
        println!("  {}", paint.rgb(label, label.color()));
    }
}

fn print_info(info: &PlayerInfo, show_retired: bool, paint: Paint) {
    println!("Tierlist info for {}", info.name);
    println!("Region: {}", paint.rgb(info.region, info.region.color()));
    for (mode, ranking) in &info.rankings {
        let Some(label) = ranking.classify(show_retired) else { continue };
        println!("{mode}: {}", paint.rgb(label, label.color()));
    }
}

fn print_full_info(info: &PlayerInfo, show_retired: bool, paint: Paint) -> anyhow::Result<()> {
    let date = format_description!("[year]-[month]-[day]");
    let point_tier = info.point_tier();

    println!("Full tierlist info for {}", info.name);
    println!("Region: {}", paint.rgb(info.region, info.region.color()));
    println!(
        "Points: {} [{}]",
        paint.rgb(info.points, point_tier.accent_color()),
        paint.rgb(point_tier.title(), point_tier.color()),
    );
    println!("Overall: #{}", info.overall);

    println!("Rankings:");
    for (mode, ranking) in info.sorted_rankings() {
        let Some(label) = ranking.classify(show_retired) else { continue };
        println!(
            "  {mode}: {} (since {})",
            paint.rgb(label, label.color()),
            ranking.attained.format(date)?
        );
    }

    if !info.badges.is_empty() {
        println!("Badges:");
        for badge in &info.badges {
            println!("  {}: {}", badge.title, badge.desc);
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let paint = Paint(!args.no_color && std::io::stdout().is_tty());

    if args.list_colors {
        print_colors(paint);
        return Ok(());
    }
    let player = args.player.as_deref().context("a player is required")?;

    let mut config = Config::from_env()?;
    args.apply(&mut config);

    let wait = runtime::start()?;

    let settings = Settings::new(config);
    let client = Client::new(settings.clone())?;
    let (repaint, settled) = flume::unbounded();
    let cache = PlayerCache::spawn(client, settings.get().cache_ttl, repaint)?;

    let info = lookup(&cache, &settled, player, settings.get().request_timeout)?;
    let config = settings.get();

    if let Some(mode) = &args.mode {
        println!("{}", name_tag(&info, mode, &config, paint));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&*info)?);
    } else if args.full {
        print_full_info(&info, config.show_retired, paint)?;
    } else {
        print_info(&info, config.show_retired, paint);
    }

    wait();
    Ok(())
}
