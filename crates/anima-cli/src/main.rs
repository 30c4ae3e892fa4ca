use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod notifier;

#[derive(Parser)]
#[command(name = "anima", version, about = "Anima mood journal host")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reminder host until interrupted
    Daemon(commands::daemon::DaemonArgs),
    /// Daily reminder settings
    Reminder {
        #[command(subcommand)]
        action: commands::reminder::ReminderAction,
    },
    /// PIN unlock and lockout status
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Appearance preference
    Theme {
        #[command(subcommand)]
        action: commands::theme::ThemeAction,
    },
    /// Epoch-day keys for the mood calendar
    Calendar {
        #[command(subcommand)]
        action: commands::calendar::CalendarAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let default_level = anima_core::Config::load_or_default().logging.level;
    let filter = EnvFilter::try_from_env("ANIMA_LOG")
        .or_else(|_| EnvFilter::try_new(&default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Daemon(args) => commands::daemon::run(args),
        Commands::Reminder { action } => commands::reminder::run(action),
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Theme { action } => commands::theme::run(action),
        Commands::Calendar { action } => commands::calendar::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
