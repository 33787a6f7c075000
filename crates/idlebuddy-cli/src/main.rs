use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod session;

#[derive(Parser)]
#[command(name = "idlebuddy", version, about = "idlebuddy CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full game state as JSON
    Status,
    /// Click for coins
    Click {
        /// Number of clicks
        #[arg(long, default_value = "1")]
        times: u32,
    },
    /// Buy an upgrade
    Buy {
        /// Upgrade ID (e.g. "basicMiner")
        upgrade_id: String,
    },
    /// Buy a lottery ticket and settle the prize
    Lottery {
        /// Ticket tier: bronze, silver or gold
        tier: idlebuddy_core::LotteryTier,
    },
    /// Focus timer control and history
    Focus {
        #[command(subcommand)]
        action: commands::focus::FocusAction,
    },
    /// Deadline tracking
    Ddl {
        #[command(subcommand)]
        action: commands::ddl::DdlAction,
    },
    /// Interact with the buddy
    Buddy {
        #[command(subcommand)]
        action: commands::buddy::BuddyAction,
    },
    /// Battle mini-game
    Battle {
        #[command(subcommand)]
        action: commands::battle::BattleAction,
    },
    /// Let virtual time pass and fire every timer due
    Advance {
        /// Seconds to advance
        seconds: u32,
    },
    /// Run in the foreground, printing events as they happen
    Run {
        /// Stop after this many seconds (runs until killed when omitted)
        #[arg(long = "for")]
        duration: Option<u64>,
        /// Wall-clock interval between updates
        #[arg(long, default_value = "1000")]
        tick_ms: u64,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("IDLEBUDDY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Status => commands::status::run(),
        Commands::Click { times } => commands::economy::click(times),
        Commands::Buy { upgrade_id } => commands::economy::buy(upgrade_id),
        Commands::Lottery { tier } => commands::economy::lottery(tier),
        Commands::Focus { action } => commands::focus::run(action),
        Commands::Ddl { action } => commands::ddl::run(action),
        Commands::Buddy { action } => commands::buddy::run(action),
        Commands::Battle { action } => commands::battle::run(action),
        Commands::Advance { seconds } => commands::sim::advance(seconds),
        Commands::Run { duration, tick_ms } => commands::sim::run(duration, tick_ms),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
