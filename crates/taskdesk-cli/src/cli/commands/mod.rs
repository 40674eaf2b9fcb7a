//! CLI command handlers.

pub mod auth;
pub mod config;
pub mod tasks;

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use taskdesk_core::client::{ApiClient, LoginRedirect};
use taskdesk_core::config::Config;
use taskdesk_core::session::TokenStore;

pub const NOT_LOGGED_IN: &str = "Not logged in. Run 'taskdesk login'.";

/// Tells the user to sign in again once the pipeline gives up on the session.
struct SessionExpiredNotice;

impl LoginRedirect for SessionExpiredNotice {
    fn redirect_to_login(&self) {
        eprintln!("Session expired. Run 'taskdesk login' to sign in again.");
    }
}

/// Builds the API client over the persisted session.
///
/// `api_url` (from `--api-url`) wins over env and config.
pub fn connect(config: &Config, api_url: Option<&str>) -> Result<ApiClient> {
    let store = TokenStore::open_default().context("open session store")?;
    let client = ApiClient::from_config(config, api_url, store)?;
    tracing::debug!(base_url = client.base_url(), "using API");

    Ok(client.with_redirect(Arc::new(SessionExpiredNotice)))
}

/// Reads one line from stdin, showing `prompt` only on a terminal.
pub fn read_input(prompt: &str) -> Result<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        print!("{prompt}");
        io::stdout().flush()?;
    }

    let mut line = String::new();
    stdin.lock().read_line(&mut line).context("read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Asks a `[y/N]` question; anything but `y` is a no.
pub fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;

    let mut response = String::new();
    io::stdin().lock().read_line(&mut response)?;
    Ok(response.trim().eq_ignore_ascii_case("y"))
}
