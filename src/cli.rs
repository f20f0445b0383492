use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ledger-core")]
#[command(about = "Balance-backed payment ledger service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Stale transaction reaper commands
    #[command(subcommand)]
    Reaper(ReaperCommands),
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum ReaperCommands {
    /// Run a single expiry and alert sweep, then exit
    SweepOnce,
}
