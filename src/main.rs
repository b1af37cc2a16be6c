//! Copywatch — Polymarket copy-trading monitor
//!
//! Watches followed wallets and alerts position changes to Telegram.

use clap::{Parser, Subcommand};
use copywatch::{
    config::Config,
    monitor::Monitor,
    notify::{NotifyTransport, TelegramNotifier},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "copywatch")]
#[command(about = "Polymarket copy-trading monitor with Telegram alerts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor
    Run,
    /// Load and validate the configuration, then exit
    Validate,
    /// Send a test message to the configured Telegram chat
    TestNotify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Validate => validate(config),
        Commands::TestNotify => test_notify(config).await,
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let mut monitor = Monitor::new(config)?;
    monitor.run().await?;
    Ok(())
}

fn validate(config: Config) -> anyhow::Result<()> {
    // Config::load already validated; report what we ended up with
    println!("Configuration OK");
    println!("  wallets: {}", config.wallets.len());
    for wallet in &config.wallets {
        match wallet.min_shares {
            Some(min) => println!("    {} ({}) min_shares={}", wallet.name, wallet.address, min),
            None => println!("    {} ({})", wallet.name, wallet.address),
        }
    }
    println!("  poll interval: {}s", config.poll_interval_secs);
    println!("  state file: {}", config.state_file);
    println!(
        "  telegram: {}",
        if config.telegram.is_some() {
            "configured"
        } else {
            "disabled (alerts will be logged)"
        }
    );
    Ok(())
}

async fn test_notify(config: Config) -> anyhow::Result<()> {
    let Some(tg) = &config.telegram else {
        anyhow::bail!("telegram is not configured");
    };
    let notifier = TelegramNotifier::new(tg)?;
    let message_id = notifier
        .send("*copywatch* test notification\n\nIf you can read this, the bot token and chat id work.")
        .await?;
    println!("Test message sent (message_id {})", message_id);
    Ok(())
}
