//! API token discovery.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Host whose netrc entry holds the API token.
pub const API_HOST: &str = "api.heroku.com";

/// Environment variable that overrides the netrc token.
pub const TOKEN_ENV: &str = "HEROKU_API_KEY";

/// Find the API token: `HEROKU_API_KEY` first, then `~/.netrc`.
pub fn api_token() -> Result<String> {
    if let Ok(token) = std::env::var(TOKEN_ENV)
        && !token.trim().is_empty()
    {
        return Ok(token.trim().to_string());
    }

    let path = netrc_path().ok_or(Error::MissingToken)?;
    token_from_netrc_file(&path)?.ok_or(Error::MissingToken)
}

fn netrc_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".netrc"))
}

/// Read the token for [`API_HOST`] from a netrc file, if it has one.
pub fn token_from_netrc_file(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(netrc_password(&content, API_HOST)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Extract the `password` of the `machine` entry matching `host`.
pub fn netrc_password(content: &str, host: &str) -> Option<String> {
    let mut tokens = content.split_whitespace();
    let mut in_host = false;

    while let Some(token) = tokens.next() {
        match token {
            "machine" => in_host = tokens.next() == Some(host),
            "default" => in_host = false,
            "password" => {
                let value = tokens.next();
                if in_host {
                    return value.map(str::to_string);
                }
            }
            _ => {}
        }
    }
    None
}
