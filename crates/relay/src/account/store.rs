// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Account persistence: one JSON object per line, atomic full rewrites.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::account::{Account, AccountStore};

/// JSONL file-backed account store.
///
/// Appends go straight to the file. Rewrites (`replace_all`, `update`) write
/// a unique temp file and rename it over the target so concurrent readers
/// never observe a half-written store. Writers inside this process are
/// serialized, and `update` holds the writer lock across its read.
pub struct JsonlStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(&self) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }
}

impl AccountStore for JsonlStore {
    fn list(&self) -> anyhow::Result<Vec<Account>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        Ok(parse_lines(&contents))
    }

    fn append(&self, account: &Account) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        self.ensure_parent()?;
        let mut line = serde_json::to_string(account)?;
        line.push('\n');
        let mut file =
            std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn replace_all(&self, accounts: &[Account]) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        self.rewrite(accounts)
    }

    fn update(&self, apply: &mut dyn FnMut(&mut Vec<Account>)) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        let mut accounts = self.list()?;
        apply(&mut accounts);
        self.rewrite(&accounts)
    }
}

impl JsonlStore {
    /// Write `accounts` to a unique temp file and rename it over the store.
    /// Callers hold `write_lock`.
    fn rewrite(&self, accounts: &[Account]) -> anyhow::Result<()> {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        self.ensure_parent()?;

        let mut data = String::new();
        for account in accounts {
            data.push_str(&serde_json::to_string(account)?);
            data.push('\n');
        }

        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp_path, data)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Parse store contents, skipping blank and malformed lines.
fn parse_lines(contents: &str) -> Vec<Account> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match serde_json::from_str::<Account>(line) {
            Ok(account) => Some(account),
            Err(e) => {
                tracing::warn!(line = idx + 1, err = %e, "skipping malformed account record");
                None
            }
        })
        .collect()
}

/// In-memory account store.
#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<Vec<Account>>,
}

impl MemoryStore {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts: Mutex::new(accounts) }
    }
}

impl AccountStore for MemoryStore {
    fn list(&self) -> anyhow::Result<Vec<Account>> {
        let accounts =
            self.accounts.lock().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        Ok(accounts.clone())
    }

    fn append(&self, account: &Account) -> anyhow::Result<()> {
        let mut accounts =
            self.accounts.lock().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        accounts.push(account.clone());
        Ok(())
    }

    fn replace_all(&self, new: &[Account]) -> anyhow::Result<()> {
        let mut accounts =
            self.accounts.lock().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        *accounts = new.to_vec();
        Ok(())
    }

    fn update(&self, apply: &mut dyn FnMut(&mut Vec<Account>)) -> anyhow::Result<()> {
        let mut accounts =
            self.accounts.lock().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        apply(&mut accounts);
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
