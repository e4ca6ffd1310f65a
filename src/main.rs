//! Binary entrypoint for the mission engine CLI.
//!
//! Commands:
//! - `init` - write a starter config and seed titles, missions and the level table
//! - `status [--json]` - store row counts and pipeline counters
//! - `record <user> <activity> [target] [--amount n]` - record item, friend or interaction activity
//! - `trigger <user> <key>` - advance every mission with a requirement on `key`
//! - `advance <user> <mission>` - advance one mission explicitly
//! - `progress <user>` - per-requirement progress, balance, level and titles
//! - `assign <user> <mission>` - make an assigned-only mission visible to a user
//!
//! See the library crate docs for module-level details: `mission_engine::`.
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use mission_engine::config::Config;
use mission_engine::metrics;
use mission_engine::mission::strategy::progress::{INTERACTION_KEYS, KEY_FRIENDS, KEY_OWNED_ITEMS};
use mission_engine::mission::{
    ActivityStats, MissionAdvance, MissionEngine, MissionError, MissionStore, MissionStoreBuilder,
};

#[derive(Parser)]
#[command(name = "missionctl")]
#[command(about = "Mission progress tracking and reward distribution")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "missions.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and seed starter content
    Init,
    /// Show store statistics and pipeline counters
    Status {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Record user activity (item, friend, or an interaction key such as posts_published)
    Record {
        user: String,
        activity: String,
        /// Item id for `item`, friend username for `friend`
        target: Option<String>,
        #[arg(short, long, default_value_t = 1)]
        amount: u32,
    },
    /// Advance every visible mission that has a requirement on KEY
    Trigger { user: String, key: String },
    /// Advance one mission for one user
    Advance { user: String, mission: String },
    /// Show a user's progress, balance, level and titles
    Progress { user: String },
    /// Assign an assigned-only mission to a user
    Assign { user: String, mission: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(&None, cli.verbose);
        return run_init(&cli.config).await;
    }

    let config = Config::load(&cli.config)
        .await
        .with_context(|| format!("run `missionctl init --config {}` first", cli.config))?;
    init_logging(&Some(config.clone()), cli.verbose);

    let store = open_store(&config)?;

    match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Status { json } => {
            let stats = store.stats();
            let counters = metrics::snapshot();
            if json {
                let value = serde_json::json!({
                    "database": config.database_path().display().to_string(),
                    "store": stats,
                    "metrics": counters,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("Database: {}", config.database_path().display());
                println!(
                    "Missions: {} ({} requirements, {} rewards)",
                    stats.missions, stats.requirements, stats.rewards
                );
                println!("Titles: {}", stats.titles);
                println!("Users: {}", stats.users);
                println!(
                    "Progress rows: {} / completions: {}",
                    stats.progress_rows, stats.completions
                );
                println!("Ledger entries: {}", stats.ledger_entries);
                println!("Logged reward errors: {}", stats.logged_errors);
            }
        }
        Commands::Record {
            user,
            activity,
            target,
            amount,
        } => {
            let (key, total) = record_activity(&store, &user, &activity, target.as_deref(), amount)?;
            println!("{} {} -> {}", user, key, total);
        }
        Commands::Trigger { user, key } => {
            let engine = build_engine(&config, store)?;
            let outcomes = engine.handle_event(&user, &key)?;
            if outcomes.is_empty() {
                println!("No open missions track '{}' for {}", key, user);
            }
            for (mission_id, advance) in outcomes {
                print_advance(&mission_id, &advance);
            }
        }
        Commands::Advance { user, mission } => {
            let engine = build_engine(&config, store)?;
            match engine.advance_mission(&user, &mission) {
                Ok(advance) => print_advance(&mission, &advance),
                Err(MissionError::MissionAlreadyCompleted { .. }) => {
                    println!("{} already completed {}", user, mission);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Progress { user } => print_progress(&config, &store, &user)?,
        Commands::Assign { user, mission } => {
            store.get_mission(&mission)?;
            store.assign_mission(&user, &mission)?;
            info!("assigned {} to {}", mission, user);
            println!("Assigned {} to {}", mission, user);
        }
    }

    Ok(())
}

async fn run_init(path: &str) -> Result<()> {
    info!("Initializing mission engine configuration");
    if tokio::fs::metadata(path).await.is_ok() {
        warn!("{} already exists, keeping it", path);
    } else {
        Config::create_default(path).await?;
        info!("Configuration file created at {}", path);
    }
    let config = Config::load(path).await?;

    tokio::fs::create_dir_all(&config.engine.data_dir)
        .await
        .map_err(|e| anyhow!("Failed to create data dir {}: {}", config.engine.data_dir, e))?;
    let store = MissionStoreBuilder::new(config.database_path())
        .with_starter_content()
        .open()?;

    let engine = build_engine(&config, store)?;
    engine.levels().replace(&config.level_table())?;
    let stats = engine.store().stats();
    info!(
        "Store ready at {} ({} missions, {} titles)",
        config.database_path().display(),
        stats.missions,
        stats.titles
    );
    Ok(())
}

fn open_store(config: &Config) -> Result<MissionStore> {
    let path = config.database_path();
    MissionStore::open(&path).with_context(|| format!("opening store at {}", path.display()))
}

fn build_engine(config: &Config, store: MissionStore) -> Result<MissionEngine> {
    let engine = MissionEngine::builder(store)
        .with_level_table(config.level_table())
        .with_currency_description(&config.rewards.default_description)
        .build()?;
    Ok(engine)
}

/// Returns the requirement key the activity feeds and its new total.
fn record_activity(
    store: &MissionStore,
    user: &str,
    activity: &str,
    target: Option<&str>,
    amount: u32,
) -> Result<(&'static str, u32)> {
    store.ensure_user(user)?;
    match activity {
        "item" => {
            let item = target.ok_or_else(|| anyhow!("record item needs an item id"))?;
            store.add_owned_item(user, item, amount)?;
            let owned = store.owned_item_count(user)?;
            Ok((KEY_OWNED_ITEMS, owned))
        }
        "friend" => {
            let friend = target.ok_or_else(|| anyhow!("record friend needs a username"))?;
            if !store.add_friend(user, friend)? {
                warn!("{} already befriended {}", user, friend);
            }
            let friends = store.friend_count(user)?;
            Ok((KEY_FRIENDS, friends))
        }
        other => {
            let key = INTERACTION_KEYS
                .iter()
                .copied()
                .find(|k| *k == other)
                .ok_or_else(|| {
                    anyhow!(
                        "unknown activity '{}' (expected item, friend or one of {})",
                        other,
                        INTERACTION_KEYS.join(", ")
                    )
                })?;
            let total = store.record_interaction(user, key, amount)?;
            Ok((key, total))
        }
    }
}

fn print_advance(mission_id: &str, advance: &MissionAdvance) {
    match advance {
        MissionAdvance::InProgress { completed, total } => {
            println!("{}: {}/{} requirements met", mission_id, completed, total);
        }
        MissionAdvance::Completed { summary } => {
            println!(
                "{}: completed, {} reward(s) granted",
                mission_id,
                summary.granted.len()
            );
            for (reward_id, error) in &summary.failed {
                println!("  reward {} failed: {}", reward_id, error);
            }
        }
    }
}

fn print_progress(config: &Config, store: &MissionStore, username: &str) -> Result<()> {
    let user = store.get_user(username)?;
    println!(
        "{} - level {} ({} XP), {} {}",
        user.display_name, user.level, user.experience, user.balance, config.rewards.currency_name
    );
    if !user.titles.is_empty() {
        println!(
            "Titles: {} (equipped: {})",
            user.titles.join(", "),
            user.equipped_title.as_deref().unwrap_or("none")
        );
    }

    for mission in store.missions_visible_to(username)? {
        let done = store.user_mission_completed(username, &mission.id)?;
        let marker = if done { "x" } else { " " };
        println!("[{}] {} ({})", marker, mission.name, mission.status);
        for requirement in store.list_requirements(&mission.id)? {
            let progress = store
                .find_progress(username, &mission.id, &requirement.id)?
                .map(|row| row.progress)
                .unwrap_or(0);
            println!(
                "    {} {}/{}",
                if requirement.description.is_empty() {
                    requirement.key.as_str()
                } else {
                    requirement.description.as_str()
                },
                progress.min(requirement.goal),
                requirement.goal
            );
        }
    }
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides config
    let configured = config
        .as_ref()
        .and_then(|cfg| cfg.logging.level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    let base_level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
