// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Disposable mailbox client used to receive registration codes.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};

/// Interval between inbox polls while waiting for a code.
pub const OTP_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// A freshly created mailbox and the bearer token to read it.
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub address: String,
    pub password: String,
    pub token: String,
}

pub struct MailClient {
    base_url: String,
    http: Client,
    otp: Regex,
    poll_interval: Duration,
}

impl MailClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            http,
            otp: Regex::new(r"\b(\d{6})\b")?,
            poll_interval: OTP_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a mailbox on the first advertised domain.
    pub async fn create_mailbox(&self) -> anyhow::Result<Mailbox> {
        let domains: Value =
            self.http.get(self.url("/domains?page=1")).send().await?.error_for_status()?.json().await?;
        let Some(domain) = members(&domains).first().and_then(|d| d.get("domain")).and_then(Value::as_str)
        else {
            anyhow::bail!("no mailbox domains available");
        };

        let address = format!("{}@{domain}", local_part());
        let password = uuid::Uuid::new_v4().to_string();
        let credentials = json!({ "address": address, "password": password });

        let created = self.http.post(self.url("/accounts")).json(&credentials).send().await?;
        if !created.status().is_success() {
            let status = created.status();
            let text = created.text().await.unwrap_or_default();
            anyhow::bail!("mailbox creation failed ({status}): {text}");
        }

        let token: Value =
            self.http.post(self.url("/token")).json(&credentials).send().await?.error_for_status()?.json().await?;
        let Some(token) = token.get("token").and_then(Value::as_str) else {
            anyhow::bail!("mailbox token missing from response");
        };

        tracing::debug!(address = %address, "mailbox created");
        Ok(Mailbox { address, password, token: token.to_owned() })
    }

    /// Newest message's code, if one has arrived.
    pub async fn check_inbox(&self, mailbox: &Mailbox) -> anyhow::Result<Option<String>> {
        let list: Value = self
            .http
            .get(self.url("/messages?page=1"))
            .bearer_auth(&mailbox.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let Some(id) = members(&list).first().and_then(|m| m.get("id")).and_then(Value::as_str) else {
            return Ok(None);
        };

        let message: Value = self
            .http
            .get(self.url(&format!("/messages/{id}")))
            .bearer_auth(&mailbox.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(self.extract_otp(&message))
    }

    /// Poll the inbox until a code arrives or `timeout` elapses.
    pub async fn wait_for_otp(&self, mailbox: &Mailbox, timeout: Duration) -> anyhow::Result<String> {
        let poll = async {
            loop {
                match self.check_inbox(mailbox).await {
                    Ok(Some(code)) => return code,
                    Ok(None) => {}
                    Err(e) => tracing::debug!(address = %mailbox.address, err = %e, "inbox poll failed"),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };
        match tokio::time::timeout(timeout, poll).await {
            Ok(code) => Ok(code),
            Err(_) => anyhow::bail!("timed out waiting for OTP email after {}s", timeout.as_secs()),
        }
    }

    /// First six-digit code in the body (text, then html), else the subject.
    pub fn extract_otp(&self, message: &Value) -> Option<String> {
        let field = |name: &str| message.get(name).and_then(html_or_text).filter(|s| !s.is_empty());
        let body = field("text").or_else(|| field("html")).unwrap_or_default();
        self.find_code(&body).or_else(|| self.find_code(&field("subject").unwrap_or_default()))
    }

    fn find_code(&self, text: &str) -> Option<String> {
        self.otp.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str().to_owned())
    }
}

/// Mail APIs return html either as a string or as a list of parts.
fn html_or_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            Some(parts.iter().filter_map(Value::as_str).collect::<Vec<_>>().join("\n"))
        }
        _ => None,
    }
}

/// Hydra collections wrap their items in `hydra:member`; plain arrays are
/// accepted too.
fn members(value: &Value) -> &[Value] {
    value
        .get("hydra:member")
        .and_then(Value::as_array)
        .or_else(|| value.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn local_part() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
    let mut rng = rand::rng();
    let suffix: String =
        (0..4).map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char).collect();
    format!("poi{}{suffix}", base36(millis))
}

fn base36(mut n: u128) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_owned();
    }
    let mut out = vec![];
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
#[path = "mail_tests.rs"]
mod tests;
