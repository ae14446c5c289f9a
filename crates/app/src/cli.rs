//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use elim_domain::{HttpMethod, LoginCredentials};

/// Authenticated client for the Elim API.
#[derive(Debug, Parser)]
#[command(name = "elim", version)]
pub struct Cli {
    /// Settings file (TOML). Defaults to `./elim.toml` when present.
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send one request through the session pipeline and print the body.
    Request {
        /// HTTP method.
        method: HttpMethod,
        /// Path relative to the configured base URL.
        path: String,
        /// JSON body.
        #[arg(long)]
        body: Option<String>,
        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// Print the logged-in user.
    Whoami {
        #[command(flatten)]
        credentials: CredentialArgs,
    },
}

/// Credentials used when no session can be resumed.
#[derive(Debug, Args)]
pub struct CredentialArgs {
    /// Account email.
    #[arg(long, env = "ELIM_EMAIL")]
    pub email: Option<String>,
    /// Account password.
    #[arg(long, env = "ELIM_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl CredentialArgs {
    /// Both values, when both were given.
    pub fn credentials(&self) -> Option<LoginCredentials> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some(LoginCredentials::new(email, password)),
            _ => None,
        }
    }
}
