// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `poirelay` binary and exercise
//! its HTTP API and session WebSocket.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use poirelay_specs::{account_record, RelayProcess};

const TIMEOUT: Duration = Duration::from_secs(10);

type Ws = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn next_json(ws: &mut Ws) -> anyhow::Result<serde_json::Value> {
    loop {
        let msg = tokio::time::timeout(TIMEOUT, ws.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("socket closed"))??;
        match msg {
            Message::Text(text) => return Ok(serde_json::from_str(&text)?),
            Message::Close(frame) => anyhow::bail!("closed: {frame:?}"),
            _ => {}
        }
    }
}

// -- HTTP ---------------------------------------------------------------------

#[tokio::test]
async fn http_health() -> anyhow::Result<()> {
    let relay = RelayProcess::start()?;
    relay.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/v1/health", relay.base_url())).await?.json().await?;

    assert_eq!(resp["status"], "running");
    assert_eq!(resp["sessionCount"], 0);
    assert_eq!(resp["checkedOut"], 0);
    Ok(())
}

#[tokio::test]
async fn http_accounts_reads_store() -> anyhow::Result<()> {
    let relay = RelayProcess::build()
        .account(account_record("alice", false))
        .account(account_record("bob", true))
        .spawn()?;
    relay.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/accounts", relay.base_url())).await?.json().await?;

    assert_eq!(resp["total"], 2);
    assert_eq!(resp["alive"], 1);
    assert_eq!(resp["dead"], 1);
    assert_eq!(resp["accounts"][1]["deadReason"], "invalid_grant");
    Ok(())
}

#[tokio::test]
async fn http_refresh_with_unreachable_provider_keeps_accounts_alive() -> anyhow::Result<()> {
    let relay = RelayProcess::build().account(account_record("alice", false)).spawn()?;
    relay.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .post(format!("{}/api/accounts/refresh", relay.base_url()))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["refreshed"], 0);
    assert_eq!(resp["died"], 0);
    assert_eq!(resp["errors"].as_array().map(Vec::len), Some(1));

    let on_disk = std::fs::read_to_string(relay.accounts_file())?;
    assert!(on_disk.contains("\"alice\""));
    assert!(!on_disk.contains("\"dead\""));
    Ok(())
}

#[tokio::test]
async fn http_poi_types() -> anyhow::Result<()> {
    let relay = RelayProcess::start()?;
    relay.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/poi-types", relay.base_url())).await?.json().await?;
    let types = resp.as_object().ok_or_else(|| anyhow::anyhow!("expected object"))?;
    assert!(!types.is_empty());
    Ok(())
}

#[tokio::test]
async fn http_auth_login_with_unreachable_provider_is_bad_gateway() -> anyhow::Result<()> {
    let relay = RelayProcess::start()?;
    relay.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/auth/login", relay.base_url()))
        .json(&serde_json::json!({"username": "op@test.com", "password": "123456"}))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 502);

    let status: serde_json::Value =
        client.get(format!("{}/api/auth/status", relay.base_url())).send().await?.json().await?;
    assert_eq!(status["authenticated"], false);
    Ok(())
}

// -- WebSocket ----------------------------------------------------------------

#[tokio::test]
async fn ws_without_accounts_is_rejected() -> anyhow::Result<()> {
    let relay = RelayProcess::start()?;
    relay.wait_healthy(TIMEOUT).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(relay.ws_url()).await?;
    let msg = next_json(&mut ws).await?;
    assert_eq!(msg["type"], "session:error");
    assert_eq!(msg["message"], "No accounts available");
    Ok(())
}

#[tokio::test]
async fn ws_trip_start_reports_unreachable_gateway() -> anyhow::Result<()> {
    let relay = RelayProcess::build().account(account_record("alice", false)).spawn()?;
    relay.wait_healthy(TIMEOUT).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(relay.ws_url()).await?;
    let ready = next_json(&mut ws).await?;
    assert_eq!(ready["type"], "session:ready");

    ws.send(Message::Text(r#"{"type":"trip:start","lat":59.33,"lng":18.06}"#.into())).await?;
    let msg = next_json(&mut ws).await?;
    assert_eq!(msg["type"], "backend_error");
    assert_eq!(msg["source"], "trip");

    ws.send(Message::Text(r#"{"type":"trip:stop"}"#.into())).await?;
    assert_eq!(next_json(&mut ws).await?["type"], "trip:stopped");
    ws.close(None).await?;

    // The account returns to the pool once the session is gone.
    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/health", relay.base_url());
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("session was never torn down");
        }
        let health: serde_json::Value = client.get(&url).send().await?.json().await?;
        if health["sessionCount"] == 0 && health["checkedOut"] == 0 {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
