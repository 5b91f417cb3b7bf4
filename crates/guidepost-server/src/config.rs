use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    /// Also push each message to the sender's own live connection.
    pub echo_to_sender: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("GUIDEPOST_DB_PATH").unwrap_or_else(|| "guidepost.db".into());
        let host = lookup("GUIDEPOST_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("GUIDEPOST_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("GUIDEPOST_PORT must be a port number")?;
        let echo_to_sender = match lookup("GUIDEPOST_ECHO_TO_SENDER") {
            None => true,
            Some(raw) => parse_bool(&raw)
                .with_context(|| format!("GUIDEPOST_ECHO_TO_SENDER: '{}'", raw))?,
        };

        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            db_path: db_path.into(),
            addr,
            echo_to_sender,
        })
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("expected true or false"),
    }
}
