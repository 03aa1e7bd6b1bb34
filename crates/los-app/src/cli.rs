use std::fmt;
use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

/// los-notify: realtime query notifications for the LOS backend.
#[derive(Parser, Debug)]
#[command(name = "los-notify", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter directive (e.g. `debug`, `los_realtime=trace`).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and print notifications until Ctrl-C.
    Listen(ListenArgs),
}

#[derive(clap::Args)]
#[command(group(
    ArgGroup::new("credentials")
        .required(true)
        .args(["token", "email"])
))]
pub struct ListenArgs {
    /// Bearer token from an existing session.
    #[arg(long)]
    pub token: Option<String>,

    /// User to listen for; looked up from the token when omitted.
    #[arg(long, requires = "token")]
    pub user_id: Option<String>,

    /// Sign in with email and password instead of a token.
    #[arg(long, requires = "password")]
    pub email: Option<String>,

    #[arg(long, requires = "email")]
    pub password: Option<String>,
}

impl fmt::Debug for ListenArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenArgs")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

pub fn parse() -> Args {
    Args::parse()
}
