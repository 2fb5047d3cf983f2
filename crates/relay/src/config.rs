// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the poirelay server.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "poirelay", version, about = "Per-client POI trip relay over a shared account pool")]
pub struct RelayConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "POIRELAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 3456, env = "POIRELAY_PORT")]
    pub port: u16,

    /// Path to the JSONL account store. Defaults to `<state dir>/accounts.jsonl`.
    #[arg(long, env = "POIRELAY_ACCOUNTS_FILE")]
    pub accounts_file: Option<PathBuf>,

    /// Base URL of the identity provider (token + registration endpoints).
    #[arg(long, default_value = "https://auth-gateway.saphe.com", env = "POIRELAY_AUTH_URL")]
    pub auth_url: String,

    /// OAuth client id presented to the identity provider.
    #[arg(long, default_value = "android", env = "POIRELAY_CLIENT_ID")]
    pub client_id: String,

    /// Base URL of the temporary mailbox API used for auto-registration.
    #[arg(long, default_value = "https://api.mail.tm", env = "POIRELAY_MAIL_API_URL")]
    pub mail_api_url: String,

    /// Base URL of the upstream trip gateway.
    #[arg(long, default_value = "https://gateway.saphe.com:13377", env = "POIRELAY_GATEWAY_URL")]
    pub gateway_url: String,

    /// Upper bound on connecting to the gateway, opening a trip stream and
    /// fetching one tile, in milliseconds.
    #[arg(long, default_value_t = 15_000, env = "POIRELAY_GATEWAY_TIMEOUT_MS")]
    pub gateway_timeout_ms: u64,

    /// Disable registering fresh accounts when the pool runs dry.
    #[arg(long, env = "POIRELAY_NO_AUTO_REGISTER")]
    pub no_auto_register: bool,

    /// Upper bound on waiting for a registration code, in milliseconds.
    #[arg(long, default_value_t = 90_000, env = "POIRELAY_OTP_TIMEOUT_MS")]
    pub otp_timeout_ms: u64,

    /// Periodic location re-send interval for active trips, in milliseconds.
    #[arg(long, default_value_t = 60_000, env = "POIRELAY_LOCATION_INTERVAL_MS")]
    pub location_interval_ms: u64,

    /// Delay between consecutive tile fetches within a session, in milliseconds.
    #[arg(long, default_value_t = 200, env = "POIRELAY_TILE_PACING_MS")]
    pub tile_pacing_ms: u64,

    /// Interval of the liveness ping sent on each session's error channel.
    #[arg(long, default_value_t = 120_000, env = "POIRELAY_HEALTH_PING_MS")]
    pub health_ping_ms: u64,

    /// Background credential refresh interval, in milliseconds.
    #[arg(long, default_value_t = 1_800_000, env = "POIRELAY_REFRESH_INTERVAL_MS")]
    pub refresh_interval_ms: u64,
}

impl RelayConfig {
    pub fn accounts_path(&self) -> PathBuf {
        match self.accounts_file {
            Some(ref path) => path.clone(),
            None => state_dir().join("accounts.jsonl"),
        }
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }

    pub fn otp_timeout(&self) -> Duration {
        Duration::from_millis(self.otp_timeout_ms)
    }

    pub fn location_interval(&self) -> Duration {
        Duration::from_millis(self.location_interval_ms)
    }

    pub fn tile_pacing(&self) -> Duration {
        Duration::from_millis(self.tile_pacing_ms)
    }

    pub fn health_ping_interval(&self) -> Duration {
        Duration::from_millis(self.health_ping_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn session_timing(&self) -> crate::session::SessionTiming {
        crate::session::SessionTiming {
            location_interval: self.location_interval(),
            tile_pacing: self.tile_pacing(),
        }
    }
}

/// Resolve the state directory for relay data.
///
/// Checks `POIRELAY_STATE_DIR`, then `$XDG_STATE_HOME/poirelay`,
/// then `$HOME/.local/state/poirelay`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("POIRELAY_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("poirelay");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/poirelay");
    }
    PathBuf::from(".poirelay")
}
