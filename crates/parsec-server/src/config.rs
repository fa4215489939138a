//! Optional TOML startup configuration: CLI flags always win, the file only
//! supplies defaults for anything left unset on the command line.

use std::path::Path;

use serde::Deserialize;

use parsec_core::constants::SSE_KEEPALIVE_DEFAULT_SECS;

#[derive(Debug, Deserialize, Default)]
pub struct ServerConfig {
    pub listen: Option<String>,
    pub sse_keepalive_secs: Option<u64>,
    pub log_filter: Option<String>,
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))
    }

    pub fn sse_keepalive_secs(&self) -> u64 {
        self.sse_keepalive_secs.unwrap_or(SSE_KEEPALIVE_DEFAULT_SECS)
    }
}
