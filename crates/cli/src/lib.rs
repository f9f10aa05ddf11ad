pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "guestline",
    about = "Guestline operator CLI",
    long_about = "Check runtime readiness, apply migrations, and inspect the guest-status audit log.",
    after_help = "Examples:\n  guestline doctor --json\n  guestline migrate\n  guestline audit --limit 5"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Validate config, credentials, and audit database readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Print the most recent audit entries for the configured organization")]
    Audit {
        #[arg(long, default_value_t = 20, help = "Maximum number of entries to print")]
        limit: u32,
        #[arg(long, help = "Only entries with this action type, e.g. update_guest_status")]
        action: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Migrate => commands::migrate::run(),
        Command::Audit { limit, action } => commands::audit::run(limit, action),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
