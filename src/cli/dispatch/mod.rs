use crate::{
    api::handlers::auth::AuthConfig,
    cli::{
        actions::{server::Args, Action},
        commands::{auth, google},
    },
    google::GoogleConfig,
};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    Ok(Action::Server(Args {
        port,
        dsn,
        auth: auth_config(matches),
        google: google_config(matches),
    }))
}

fn auth_config(matches: &clap::ArgMatches) -> AuthConfig {
    let mut config = matches
        .get_one::<String>(auth::ARG_FRONTEND_BASE_URL)
        .cloned()
        .map_or_else(AuthConfig::default, AuthConfig::new);
    if let Some(seconds) = matches.get_one::<i64>(auth::ARG_ACCESS_TOKEN_TTL) {
        config = config.with_access_token_ttl_seconds(*seconds);
    }
    if let Some(seconds) = matches.get_one::<i64>(auth::ARG_REFRESH_TOKEN_TTL) {
        config = config.with_refresh_token_ttl_seconds(*seconds);
    }
    if let Some(seconds) = matches.get_one::<i64>(auth::ARG_RESET_TOKEN_TTL) {
        config = config.with_reset_token_ttl_seconds(*seconds);
    }
    config
}

fn google_config(matches: &clap::ArgMatches) -> Option<GoogleConfig> {
    let value = |id: &str| matches.get_one::<String>(id).cloned();
    Some(GoogleConfig {
        client_id: value(google::ARG_CLIENT_ID)?,
        client_secret: SecretString::from(value(google::ARG_CLIENT_SECRET)?),
        redirect_uri: value(google::ARG_REDIRECT_URI)?,
    })
}
