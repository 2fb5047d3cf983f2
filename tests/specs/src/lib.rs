// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `poirelay` binary as a subprocess against a temporary
//! accounts file and exercises it over HTTP and WebSocket.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Once;
use std::time::Duration;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Resolve the path to the compiled `poirelay` binary.
pub fn poirelay_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("poirelay")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// One JSONL account record, in the on-disk format.
pub fn account_record(username: &str, dead: bool) -> serde_json::Value {
    let mut record = serde_json::json!({
        "username": username,
        "appInstallationId": format!("install-{username}"),
        "tokens": {
            "access_token": format!("at-{username}"),
            "refresh_token": format!("rt-{username}"),
            "id_token": "",
            "expires_in": 3600,
            "token_type": "Bearer",
            "scope": "openid"
        },
        "obtainedAt": 1_700_000_000_000u64,
    });
    if dead {
        record["dead"] = true.into();
        record["deadReason"] = "invalid_grant".into();
        record["deadAt"] = 1_700_000_100_000u64.into();
    }
    record
}

/// A running `poirelay` process that is killed on drop.
pub struct RelayProcess {
    child: Child,
    port: u16,
    accounts_file: PathBuf,
    _dir: tempfile::TempDir,
}

/// Builder for the accounts and upstream endpoints a [`RelayProcess`] uses.
#[derive(Default)]
pub struct RelayBuilder {
    accounts: Vec<serde_json::Value>,
}

impl RelayBuilder {
    /// Seed the accounts file with `record`.
    pub fn account(mut self, record: serde_json::Value) -> Self {
        self.accounts.push(record);
        self
    }

    /// Spawn the relay with auto-registration disabled and every upstream
    /// pointed at a closed local port.
    pub fn spawn(self) -> anyhow::Result<RelayProcess> {
        ensure_crypto();
        let binary = poirelay_binary();
        anyhow::ensure!(binary.exists(), "poirelay binary not found at {}", binary.display());

        let dir = tempfile::tempdir()?;
        let accounts_file = dir.path().join("accounts.jsonl");
        let mut file = std::fs::File::create(&accounts_file)?;
        for record in &self.accounts {
            writeln!(file, "{record}")?;
        }
        drop(file);

        let port = free_port()?;
        let dead_end = format!("http://127.0.0.1:{}", free_port()?);
        let args: Vec<String> = vec![
            "--host".into(),
            "127.0.0.1".into(),
            "--port".into(),
            port.to_string(),
            "--accounts-file".into(),
            accounts_file.to_string_lossy().into_owned(),
            "--auth-url".into(),
            dead_end.clone(),
            "--gateway-url".into(),
            dead_end,
            "--gateway-timeout-ms".into(),
            "2000".into(),
            "--no-auto-register".into(),
        ];

        let child = Command::new(&binary)
            .args(&args)
            .env("RUST_LOG", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(RelayProcess { child, port, accounts_file, _dir: dir })
    }
}

impl RelayProcess {
    pub fn build() -> RelayBuilder {
        RelayBuilder::default()
    }

    /// Spawn the relay with an empty accounts file.
    pub fn start() -> anyhow::Result<Self> {
        Self::build().spawn()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn accounts_file(&self) -> &Path {
        &self.accounts_file
    }

    /// Base URL for HTTP requests.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// WebSocket URL of the session endpoint.
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws/pois", self.port)
    }

    /// Poll health until responsive.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/health", self.base_url());
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("poirelay did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for RelayProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
