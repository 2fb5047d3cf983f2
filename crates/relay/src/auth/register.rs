// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-demand account registration through a disposable mailbox.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::account::pool::Registrar;
use crate::account::Account;
use crate::auth::mail::MailClient;
use crate::auth::{AuthClient, CodeRequest, Profile};
use crate::state::epoch_ms;

pub struct AutoRegistrar {
    auth: Arc<AuthClient>,
    mail: MailClient,
    otp_timeout: Duration,
    profile: Profile,
}

impl AutoRegistrar {
    pub fn new(auth: Arc<AuthClient>, mail: MailClient, otp_timeout: Duration) -> Self {
        Self { auth, mail, otp_timeout, profile: Profile::default() }
    }
}

#[async_trait::async_trait]
impl Registrar for AutoRegistrar {
    /// Mailbox, registration, mailed code, then password grant. The pool
    /// persists the result.
    async fn register(&self) -> anyhow::Result<Account> {
        let mailbox = self.mail.create_mailbox().await.context("mailbox creation")?;
        tracing::info!(email = %mailbox.address, "registering new account");

        self.auth.register_user(&mailbox.address, &self.profile).await.context("registration")?;

        match self.auth.request_verification_code(&mailbox.address).await.context("code request")? {
            CodeRequest::Sent => {}
            CodeRequest::UserNotFound => {
                anyhow::bail!("code request: {} not found after registration", mailbox.address)
            }
        }

        let otp = self.mail.wait_for_otp(&mailbox, self.otp_timeout).await?;
        tracing::debug!(email = %mailbox.address, "verification code received");

        let tokens =
            self.auth.request_access_token(&mailbox.address, &otp).await.context("token exchange")?;
        let account = Account {
            username: mailbox.address,
            app_installation_id: uuid::Uuid::new_v4().to_string(),
            tokens,
            obtained_at: epoch_ms(),
            dead: false,
            dead_reason: None,
            dead_at: None,
        };
        tracing::info!(account = %account.username, "account registered");
        Ok(account)
    }
}

#[cfg(test)]
#[path = "register_tests.rs"]
mod tests;
