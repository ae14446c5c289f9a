//! Elim API client - Main Entry Point
//!
//! Loads settings, resumes or opens a session and sends one request
//! through the authenticated pipeline.

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use elim_application::{ClientError, GateState, SessionClient};
use elim_domain::{ApiRequest, CurrentUser};
use elim_infrastructure::{Logger, ReqwestTransport, SystemClock, load_settings};
use tracing::{info, warn};

use cli::{Cli, Command, CredentialArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logger = Logger::init_bootstrap()?;
    let settings = load_settings(cli.config.as_deref())?;
    logger.apply(&settings.log)?;
    info!(
        base_url = %settings.client.base_url,
        "elim v{}",
        env!("CARGO_PKG_VERSION")
    );

    let transport = Arc::new(ReqwestTransport::new(&settings.client)?);
    let client = SessionClient::new(transport, &settings, Arc::new(SystemClock::new()));

    match cli.command {
        Command::Request {
            method,
            path,
            body,
            credentials,
        } => {
            open_session(&client, &credentials).await?;
            let mut request = ApiRequest::new(method, path);
            if let Some(body) = body {
                let json = serde_json::from_str(&body).context("--body is not valid JSON")?;
                request = request.with_json(json);
            }
            let response = client
                .send_authenticated(request)
                .await
                .map_err(describe)?;
            println!("{}", response.text());
        }
        Command::Whoami { credentials } => {
            open_session(&client, &credentials).await?;
            let user = current_user(&client).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
    }

    Ok(())
}

/// Resumes the session from the refresh cookie, logging in when that fails.
async fn open_session(client: &SessionClient, credentials: &CredentialArgs) -> Result<()> {
    if client.gate().bootstrap().await == GateState::Ready {
        info!("session resumed");
    } else {
        let Some(credentials) = credentials.credentials() else {
            bail!("no session to resume; pass --email and --password (or ELIM_EMAIL / ELIM_PASSWORD)");
        };
        client.login(&credentials).await.map_err(describe)?;
    }

    client.on_session_ended(|event| warn!(reason = %event.reason, "session ended"));
    Ok(())
}

async fn current_user(client: &SessionClient) -> Result<CurrentUser> {
    if let Some(user) = client.current_user() {
        return Ok(user);
    }
    client
        .resume()
        .await
        .map_err(describe)?
        .ok_or_else(|| anyhow!("the server did not describe the current user"))
}

fn describe(error: ClientError) -> anyhow::Error {
    let summary = format!("{} (code {})", error.user_message(), error.code());
    anyhow::Error::new(error).context(summary)
}
