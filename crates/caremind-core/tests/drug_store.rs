//! On-disk drug store and configuration tests.
//!
//! # Scenarios covered
//!
//! 1. **Reopen after ingest** - records loaded through [`open_store`] are
//!    visible through [`open_existing`]; a missing path is a typed
//!    [`StoreError::NotFound`] and creates nothing.
//! 2. **FTS stays in sync** - after `enable_fts`, later upserts are found by
//!    trigram search through the sync triggers.
//! 3. **Partial updates** - a second ingest only overwrites columns it sets.
//! 4. **Config file resolution** - a `caremind.toml` on disk combined with an
//!    environment lookup.

use caremind_core::config::{Settings, StrategyKind, load_file_config};
use caremind_core::db::drugs::{self, NameMatch};
use caremind_core::db::{open_existing, open_store};
use caremind_core::ingest::load_drugs_jsonl;
use caremind_core::{ErrorCode, StoreError};
use std::path::PathBuf;

#[test]
fn records_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("drugs.sqlite");

    let mut conn = open_store(&path).expect("create store");
    let lines = "{\"药品名称\": \"氨氯地平\", \"英文名\": \"Amlodipine\", \"适应症\": \"高血压\"}\n";
    let report = load_drugs_jsonl(&mut conn, lines.as_bytes(), true).expect("load");
    assert_eq!(report.inserted, 1);
    drop(conn);

    let conn = open_existing(&path).expect("reopen");
    let (record, matched) = drugs::find_by_name(&conn, "Amlodipine")
        .expect("lookup")
        .expect("found by generic name");
    assert_eq!(matched, NameMatch::Exact);
    assert_eq!(record.name, "氨氯地平");
    assert!(record.updated_at.is_some());
}

#[test]
fn missing_store_is_a_typed_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent").join("drugs.sqlite");

    let err = open_existing(&path).expect_err("missing store");
    let store = err.downcast_ref::<StoreError>().expect("typed error");
    assert_eq!(store.code(), ErrorCode::StoreNotFound);
    assert!(!dir.path().join("absent").exists());
}

#[test]
fn fts_tracks_later_upserts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut conn = open_store(&dir.path().join("drugs.sqlite")).expect("store");

    load_drugs_jsonl(&mut conn, "{\"name\": \"二甲双胍\", \"适应症\": \"2型糖尿病\"}\n".as_bytes(), true)
        .expect("first load");
    drugs::enable_fts(&conn).expect("enable fts");
    assert!(drugs::has_fts(&conn).expect("has fts"));

    load_drugs_jsonl(
        &mut conn,
        concat!(
            "{\"name\": \"二甲双胍\", \"禁忌症\": \"严重肾功能不全\"}\n",
            "{\"name\": \"格列美脲\", \"适应症\": \"2型糖尿病\"}\n",
        )
        .as_bytes(),
        true,
    )
    .expect("second load");

    let renal = drugs::search_fts(&conn, "肾功能不全", 5).expect("fts search");
    assert_eq!(renal.len(), 1);
    assert_eq!(renal[0].name, "二甲双胍");

    let diabetes = drugs::search_fts(&conn, "糖尿病", 5).expect("fts search");
    assert_eq!(diabetes.len(), 2);
}

#[test]
fn second_ingest_keeps_unset_columns() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut conn = open_store(&dir.path().join("drugs.sqlite")).expect("store");

    load_drugs_jsonl(
        &mut conn,
        "{\"name\": \"华法林\", \"适应症\": \"血栓栓塞\", \"妊娠分级\": \"X\"}\n".as_bytes(),
        true,
    )
    .expect("first load");
    let report = load_drugs_jsonl(
        &mut conn,
        "{\"name\": \"华法林\", \"适应症\": \"\", \"相互作用\": \"阿司匹林\"}\n".as_bytes(),
        true,
    )
    .expect("second load");
    assert_eq!(report.updated, 1);

    let (record, _) = drugs::find_by_name(&conn, "华法林")
        .expect("lookup")
        .expect("present");
    assert_eq!(record.indications.as_deref(), Some("血栓栓塞"));
    assert_eq!(record.pregnancy_category.as_deref(), Some("X"));
    assert_eq!(record.interactions.as_deref(), Some("阿司匹林"));
}

#[test]
fn config_file_and_env_resolve_together() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("caremind.toml");
    std::fs::write(
        &path,
        r#"
demo = false

[store]
drug_db = "data/drugs.sqlite"

[retrieval]
strategy = "rrf"
k_rrf = 30.0
topn = 5
"#,
    )
    .expect("write config");

    let file = load_file_config(&path).expect("parse config");
    let env = |key: &str| match key {
        "CAREMIND_DEMO" => Some("1".to_string()),
        "CAREMIND_GUIDELINE_DB" => Some("/srv/guidelines.sqlite".to_string()),
        "CAREMIND_SQLITE_PATH" => Some("/srv/ignored.sqlite".to_string()),
        _ => None,
    };
    let settings = Settings::resolve(&file, env).expect("resolve");

    assert!(!settings.demo);
    assert_eq!(settings.drug_db, PathBuf::from("data/drugs.sqlite"));
    assert_eq!(settings.guideline_db, PathBuf::from("/srv/guidelines.sqlite"));
    assert_eq!(settings.retrieval.strategy, StrategyKind::Rrf);
    assert!((settings.retrieval.k_rrf - 30.0).abs() < f32::EPSILON);
    assert_eq!(settings.retrieval.topn, 5);
    assert_eq!(settings.retrieval.k_guideline, 6);
}
