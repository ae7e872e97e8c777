use std::error::Error;
use std::sync::Arc;

use checklist_core::{Answer, AnswerValue, FieldViewModel};
use checklist_engine::{CommitOutcome, EngineError, FlushReport};
use checklist_harness::fixtures::{CHECKLIST_ID, visit_checklist};
use checklist_harness::{FakeBackend, TestDevice, init_tracing};
use checklist_storage::SqliteStorage;

fn backend() -> Arc<FakeBackend> {
    init_tracing();
    Arc::new(FakeBackend::with_checklist(CHECKLIST_ID, visit_checklist()))
}

fn text(value: &str) -> Option<AnswerValue> {
    Some(AnswerValue::Text(value.into()))
}

// ============================================================================
// One answer per request
// ============================================================================

#[tokio::test]
async fn every_commit_posts_a_single_answer() -> Result<(), Box<dyn Error>> {
    let device = TestDevice::new(backend())?;
    let mut session = device.open(CHECKLIST_ID).await?;

    session.select_option("access", "1")?;
    session.set_checkbox("bait_replaced", true)?;
    session.set_text("note", "следы на плинтусе")?;
    session.commit_text("note")?;
    session.settle().await;

    let posts = device.backend.posts();
    assert_eq!(posts.len(), 3);
    assert!(posts.iter().all(|patch| patch.answers.len() == 1));
    assert_eq!(
        device.backend.posted_answers(),
        vec![
            Answer::value("access", AnswerValue::Text("1".into())),
            Answer::checked("bait_replaced", true),
            Answer::value("note", AnswerValue::Text("следы на плинтусе".into())),
        ]
    );
    assert_eq!(session.pending_count()?, 0);
    Ok(())
}

#[tokio::test]
async fn delivered_answers_come_back_on_next_fetch() -> Result<(), Box<dyn Error>> {
    let device = TestDevice::new(backend())?;
    let mut session = device.open(CHECKLIST_ID).await?;
    session.select_option("access", "1")?;
    session.settle().await;

    let session = device.open(CHECKLIST_ID).await?;
    let Some(FieldViewModel::Radio(access)) = session.field("access") else {
        panic!("expected radio");
    };
    assert_eq!(access.options.iter().find(|o| o.selected).map(|o| o.value.as_str()), Some("1"));
    Ok(())
}

// ============================================================================
// Outbox
// ============================================================================

#[tokio::test]
async fn rejected_answer_stays_pending_until_flushed() -> Result<(), Box<dyn Error>> {
    let device = TestDevice::new(backend())?;
    let mut session = device.open(CHECKLIST_ID).await?;

    device.backend.set_reject_posts(true);
    let outcome = session.select_option("access", "0")?;
    assert!(matches!(outcome, CommitOutcome::Sent(_)));
    session.settle().await;
    assert!(device.backend.posts().is_empty());
    assert_eq!(session.pending_count()?, 1);

    // Not due yet.
    assert_eq!(session.flush_due().await?, FlushReport::default());

    device.backend.set_reject_posts(false);
    let report = session.flush(u64::MAX).await?;
    assert_eq!(report.delivered, 1);
    assert_eq!(session.pending_count()?, 0);
    assert_eq!(device.backend.posted_answers()[0].value, text("0"));
    Ok(())
}

#[tokio::test]
async fn newer_answer_supersedes_undelivered_one() -> Result<(), Box<dyn Error>> {
    let device = TestDevice::new(backend())?;
    let mut session = device.open(CHECKLIST_ID).await?;
    session.select_option("access", "1")?;
    session.settle().await;

    device.backend.set_reject_posts(true);
    session.set_text("note", "первый вариант")?;
    session.commit_text("note")?;
    session.set_text("note", "второй вариант")?;
    session.commit_text("note")?;
    session.settle().await;
    assert_eq!(session.pending_count()?, 1);

    device.backend.set_reject_posts(false);
    let report = session.flush(u64::MAX).await?;
    assert_eq!(report, FlushReport { delivered: 1, failed: 0 });

    let notes: Vec<_> = device
        .backend
        .posted_answers()
        .into_iter()
        .filter(|a| a.answer == "note")
        .collect();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].value, text("второй вариант"));
    Ok(())
}

#[tokio::test]
async fn pending_answers_replay_over_refetched_schema() -> Result<(), Box<dyn Error>> {
    let device = TestDevice::new(backend())?;
    let mut session = device.open(CHECKLIST_ID).await?;

    device.backend.set_reject_posts(true);
    session.select_option("access", "1")?;
    session.set_text("note", "ждёт отправки")?;
    session.commit_text("note")?;
    session.settle().await;

    session.refresh().await?;
    let Some(FieldViewModel::Text(note)) = session.field("note") else {
        panic!("expected text field");
    };
    assert_eq!(note.value, "ждёт отправки");
    assert!(!session.evaluate().content_hidden);
    Ok(())
}

// ============================================================================
// Offline open
// ============================================================================

#[tokio::test]
async fn offline_open_uses_stored_snapshot() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("outbox.db");
    let path = path.to_str().ok_or("non-utf8 temp path")?;
    let backend = backend();

    {
        let device = TestDevice::with_storage(backend.clone(), SqliteStorage::open(path)?);
        let mut session = device.open(CHECKLIST_ID).await?;
        backend.set_offline(true);
        session.set_text("note", "без связи")?;
        session.commit_text("note")?;
        session.settle().await;
        assert_eq!(session.pending_count()?, 1);
    }

    let device = TestDevice::with_storage(backend.clone(), SqliteStorage::open(path)?);
    let mut session = device.open(CHECKLIST_ID).await?;
    assert_eq!(session.checklist().zones.len(), 2);
    let Some(FieldViewModel::Text(note)) = session.field("note") else {
        panic!("expected text field");
    };
    assert_eq!(note.value, "без связи");

    backend.set_offline(false);
    let report = session.flush(u64::MAX).await?;
    assert_eq!(report.delivered, 1);
    Ok(())
}

#[tokio::test]
async fn offline_open_without_snapshot_fails() -> Result<(), Box<dyn Error>> {
    let backend = backend();
    backend.set_offline(true);
    let device = TestDevice::new(backend)?;

    let result = device.open(CHECKLIST_ID).await;
    assert!(matches!(result, Err(EngineError::ChecklistUnavailable(_))));
    Ok(())
}
