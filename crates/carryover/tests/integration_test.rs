//! End-to-end transfers from a JSON export into a directory tree.

#![allow(clippy::pedantic)]

mod common;

use carryover::checkpoint::read_checkpoint;
use carryover::clients::directory::MetaFile;
use carryover::clients::FLAG_FLAGGED;
use carryover::orchestrator::TransferEvent;
use carryover::{Orchestrator, TransferConfig, TransferOutcome};
use common::Fixture;
use std::fs;

fn load(fixture: &Fixture) -> TransferConfig {
    TransferConfig::from_file(&fixture.config_path()).unwrap()
}

#[tokio::test]
async fn test_full_transfer_writes_every_item() {
    let fixture = Fixture::new();
    let mut orchestrator = Orchestrator::from_config(&load(&fixture)).unwrap();

    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.outcome, TransferOutcome::Complete);
    assert_eq!(report.transferred, 3);
    assert!(fixture.mail_dir().join("INBOX/m1.eml").exists());
    assert!(fixture.mail_dir().join("INBOX/m2.eml").exists());
    assert!(fixture.mail_dir().join("Sent/m3.eml").exists());
    assert!(!fixture.mail_dir().join("CHAT").exists());

    let meta: MetaFile = serde_json::from_str(
        &fs::read_to_string(fixture.mail_dir().join("Sent/m3.meta.json")).unwrap(),
    )
    .unwrap();
    assert!(meta.metadata.flags.contains(FLAG_FLAGGED));

    let saved = read_checkpoint(&fixture.checkpoint_path()).unwrap();
    assert_eq!(saved.session.completed_categories, 2);
    assert_eq!(saved.category_mapping["[Gmail]/Sent Mail"], "Sent");
}

#[tokio::test]
async fn test_interrupted_transfer_resumes_where_it_stopped() {
    let fixture = Fixture::new();
    let config = load(&fixture);

    let first = Orchestrator::from_config(&config).unwrap();
    let token = first.cancellation_token();
    let mut first = first.with_observer(move |event: &TransferEvent| {
        if matches!(event, TransferEvent::ItemTransferred { .. }) {
            token.cancel();
        }
    });
    let report = first.run().await.unwrap();
    assert_eq!(report.outcome, TransferOutcome::Interrupted);
    assert!(fixture.mail_dir().join("INBOX/m1.eml").exists());
    assert!(!fixture.mail_dir().join("INBOX/m2.eml").exists());

    let mut second = Orchestrator::from_config(&config).unwrap();
    let report = second.run().await.unwrap();

    assert_eq!(report.outcome, TransferOutcome::Complete);
    assert_eq!(report.transferred, 2);
    assert_eq!(report.duplicates_skipped, 1);
    assert_eq!(report.session_id, first.session().session_id);
    assert!(fixture.mail_dir().join("Sent/m3.eml").exists());
}

#[tokio::test]
async fn test_corrupt_checkpoint_restarts_and_redelivers_safely() {
    let fixture = Fixture::new();
    let config = load(&fixture);
    Orchestrator::from_config(&config)
        .unwrap()
        .run()
        .await
        .unwrap();
    fs::write(fixture.checkpoint_path(), "{ truncated").unwrap();

    let report = Orchestrator::from_config(&config)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, TransferOutcome::Complete);
    assert_eq!(report.transferred, 3);
    assert!(fixture.path("progress.json.corrupt").exists());
    // Redelivery overwrites, it never duplicates files
    let inbox_files = fs::read_dir(fixture.mail_dir().join("INBOX")).unwrap().count();
    assert_eq!(inbox_files, 4);
}

#[tokio::test]
async fn test_plan_matches_later_run() {
    let fixture = Fixture::new();
    let config = load(&fixture);
    let orchestrator = Orchestrator::from_config(&config).unwrap();

    let plan = orchestrator.plan().await.unwrap();
    assert!(!fixture.mail_dir().exists());
    assert!(!fixture.checkpoint_path().exists());

    let report = Orchestrator::from_config(&config)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(plan.pending_items() as u64, report.transferred);
}

#[test]
fn test_invalid_config_is_rejected_before_any_write() {
    let fixture = Fixture::new();
    fixture.write_config("  checkpoint_interval: 0\n");

    let result = Orchestrator::from_config(&load(&fixture));

    assert!(result.is_err());
    assert!(!fixture.checkpoint_path().exists());
}
