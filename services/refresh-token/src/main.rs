//! User refresh-token driver
//!
//! Single-binary tool that:
//! 1. Loads refresh settings (`--config`, `CONFIG_PATH`, or defaults)
//! 2. Reads an `authorized_user` credential file (`--credentials` or
//!    `GOOGLE_APPLICATION_CREDENTIALS`)
//! 3. Exchanges its refresh token for an access token
//! 4. Prints the token type and expiry (never the tokens themselves)

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use user_refresh::{RefreshConfig, UserRefreshClient};

/// Value following `flag` on the command line, if present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

/// Resolve the credential file from CLI arg or GOOGLE_APPLICATION_CREDENTIALS.
fn resolve_credentials_path(cli_path: Option<&str>) -> Option<PathBuf> {
    cli_path
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();

    let config_path = RefreshConfig::resolve_path(flag_value(&args, "--config"));
    let config = RefreshConfig::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    info!(
        token_endpoint = %config.token_endpoint,
        timeout_secs = config.timeout_secs,
        "configuration loaded"
    );

    let credentials_path = resolve_credentials_path(flag_value(&args, "--credentials"))
        .context("no credential file: pass --credentials or set GOOGLE_APPLICATION_CREDENTIALS")?;
    let file = tokio::fs::File::open(&credentials_path)
        .await
        .with_context(|| format!("failed to open {}", credentials_path.display()))?;

    let client = UserRefreshClient::from_config(&config, reqwest::Client::new());
    client
        .populate_from_reader(Some(file))
        .await
        .with_context(|| format!("invalid credential file {}", credentials_path.display()))?;

    let outcome = client.refresh().await.context("token refresh failed")?;
    info!("access token obtained");

    let summary = json!({
        "client_id": client.record().client_id(),
        "token_type": outcome.credentials.token_type,
        "expiry_date": outcome.credentials.expiry_date,
        "expires_in": outcome.response.expires_in,
        "scope": outcome.response.scope,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flag_value_returns_following_arg() {
        let argv = args(&["user-refresh-token", "--config", "a.toml", "--credentials", "c.json"]);
        assert_eq!(flag_value(&argv, "--config"), Some("a.toml"));
        assert_eq!(flag_value(&argv, "--credentials"), Some("c.json"));
    }

    #[test]
    fn flag_without_value_is_none() {
        let argv = args(&["user-refresh-token", "--config"]);
        assert_eq!(flag_value(&argv, "--config"), None);
        assert_eq!(flag_value(&argv, "--credentials"), None);
    }

    #[test]
    fn cli_credentials_path_wins() {
        assert_eq!(
            resolve_credentials_path(Some("/tmp/adc.json")),
            Some(PathBuf::from("/tmp/adc.json"))
        );
    }
}
