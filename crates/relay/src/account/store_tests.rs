// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::account::test_support::{account, dead_account};

#[test]
fn missing_file_lists_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = JsonlStore::new(dir.path().join("accounts.jsonl"));
    assert!(store.list()?.is_empty());
    Ok(())
}

#[test]
fn append_then_list_preserves_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = JsonlStore::new(dir.path().join("nested/accounts.jsonl"));

    store.append(&account("a@test.com"))?;
    store.append(&dead_account("b@test.com"))?;

    let listed = store.list()?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].username, "a@test.com");
    assert!(!listed[0].dead);
    assert_eq!(listed[1].username, "b@test.com");
    assert!(listed[1].dead);
    assert_eq!(listed[1].dead_reason.as_deref(), Some("refresh rejected"));
    Ok(())
}

#[test]
fn replace_all_rewrites_and_leaves_no_temp_files() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("accounts.jsonl");
    let store = JsonlStore::new(&path);

    store.append(&account("a@test.com"))?;
    store.append(&account("b@test.com"))?;

    let mut accounts = store.list()?;
    accounts[0].mark_dead("revoked", 42);
    store.replace_all(&accounts)?;

    let listed = store.list()?;
    assert_eq!(listed.len(), 2);
    assert!(listed[0].dead);
    assert_eq!(listed[0].dead_at, Some(42));

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[test]
fn malformed_lines_are_skipped() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("accounts.jsonl");
    let good = serde_json::to_string(&account("a@test.com"))?;
    std::fs::write(&path, format!("{good}\nnot json\n\n"))?;

    let store = JsonlStore::new(&path);
    let listed = store.list()?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].username, "a@test.com");
    Ok(())
}

#[test]
fn records_use_camel_case_and_omit_alive_flags() -> anyhow::Result<()> {
    let json = serde_json::to_value(account("a@test.com"))?;
    assert_eq!(json["appInstallationId"], "app-a@test.com");
    assert!(json["obtainedAt"].is_number());
    assert_eq!(json["tokens"]["access_token"], "access-a@test.com");
    assert!(json.get("dead").is_none());
    assert!(json.get("deadReason").is_none());
    Ok(())
}

#[test]
fn memory_store_round_trips() -> anyhow::Result<()> {
    let store = MemoryStore::default();
    store.append(&account("a@test.com"))?;
    store.replace_all(&[account("b@test.com"), account("c@test.com")])?;
    let names: Vec<_> = store.list()?.into_iter().map(|a| a.username).collect();
    assert_eq!(names, vec!["b@test.com", "c@test.com"]);
    Ok(())
}

#[test]
fn update_rewrites_in_place() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = JsonlStore::new(dir.path().join("accounts.jsonl"));
    store.append(&account("a@test.com"))?;
    store.append(&account("b@test.com"))?;

    store.update(&mut |accounts| {
        for a in accounts.iter_mut().filter(|a| a.username == "b@test.com") {
            a.mark_dead("revoked", 7);
        }
    })?;

    let listed = store.list()?;
    assert_eq!(listed.len(), 2);
    assert!(!listed[0].dead);
    assert_eq!(listed[1].dead_at, Some(7));
    Ok(())
}

#[test]
fn appends_racing_updates_are_never_lost() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = std::sync::Arc::new(JsonlStore::new(dir.path().join("accounts.jsonl")));
    store.append(&account("seed@test.com"))?;

    let appenders: Vec<_> = (0..8)
        .map(|i| {
            let store = std::sync::Arc::clone(&store);
            std::thread::spawn(move || store.append(&account(&format!("new-{i}@test.com"))))
        })
        .collect();
    for _ in 0..8 {
        store.update(&mut |accounts| {
            for a in accounts.iter_mut() {
                a.obtained_at += 1;
            }
        })?;
    }
    for handle in appenders {
        handle.join().map_err(|_| anyhow::anyhow!("appender panicked"))??;
    }

    assert_eq!(store.list()?.len(), 9);
    Ok(())
}

#[test]
fn memory_store_update_applies_closure() -> anyhow::Result<()> {
    let store = MemoryStore::new(vec![account("a@test.com")]);
    store.update(&mut |accounts| accounts.push(account("b@test.com")))?;
    assert_eq!(store.list()?.len(), 2);
    Ok(())
}
