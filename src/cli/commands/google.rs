use clap::{Arg, Command};

pub const ARG_CLIENT_ID: &str = "google-client-id";
pub const ARG_CLIENT_SECRET: &str = "google-client-secret";
pub const ARG_REDIRECT_URI: &str = "google-redirect-uri";

/// Google sign-in is enabled only when all three values are present.
#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CLIENT_ID)
                .long(ARG_CLIENT_ID)
                .help("Google OAuth client id")
                .env("TUTELA_GOOGLE_CLIENT_ID")
                .requires(ARG_CLIENT_SECRET)
                .requires(ARG_REDIRECT_URI),
        )
        .arg(
            Arg::new(ARG_CLIENT_SECRET)
                .long(ARG_CLIENT_SECRET)
                .help("Google OAuth client secret")
                .env("TUTELA_GOOGLE_CLIENT_SECRET")
                .hide_env_values(true)
                .requires(ARG_CLIENT_ID),
        )
        .arg(
            Arg::new(ARG_REDIRECT_URI)
                .long(ARG_REDIRECT_URI)
                .help("Redirect URI registered with Google")
                .env("TUTELA_GOOGLE_REDIRECT_URI")
                .requires(ARG_CLIENT_ID),
        )
}
