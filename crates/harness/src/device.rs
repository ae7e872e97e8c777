use std::sync::Arc;

use parking_lot::Mutex;

use checklist_core::ChecklistId;
use checklist_engine::{
    ChecklistSession, EngineConfig, EngineError, ScreenSequence, SessionDeps, SharedStorage,
    ZoneEntry, shared,
};
use checklist_storage::{SqliteStorage, StorageError};

use crate::backend::FakeBackend;
use crate::confirm::ScriptedConfirmer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceEvent {
    NextTab { from_zone: usize },
    PreviousTab { from_zone: usize },
    Reload,
}

/// Screen sequence that records the callbacks it receives.
#[derive(Clone, Default)]
pub struct RecordingSequence {
    events: Arc<Mutex<Vec<SequenceEvent>>>,
}

impl RecordingSequence {
    pub fn events(&self) -> Vec<SequenceEvent> {
        self.events.lock().clone()
    }
}

impl ScreenSequence for RecordingSequence {
    fn on_next_tab(&mut self, from_zone: usize) {
        self.events.lock().push(SequenceEvent::NextTab { from_zone });
    }

    fn on_previous_tab(&mut self, from_zone: usize) {
        self.events.lock().push(SequenceEvent::PreviousTab { from_zone });
    }

    fn on_reload(&mut self) {
        self.events.lock().push(SequenceEvent::Reload);
    }
}

/// One field device: its own outbox, dialogs and screen sequence, talking
/// to a shared backend.
pub struct TestDevice {
    pub backend: Arc<FakeBackend>,
    pub storage: SharedStorage,
    pub confirmer: Arc<ScriptedConfirmer>,
    pub sequence: RecordingSequence,
    pub config: EngineConfig,
}

impl TestDevice {
    pub fn new(backend: Arc<FakeBackend>) -> Result<Self, StorageError> {
        Ok(Self::with_storage(backend, SqliteStorage::open_in_memory()?))
    }

    pub fn with_storage(backend: Arc<FakeBackend>, storage: SqliteStorage) -> Self {
        Self {
            backend,
            storage: shared(storage),
            confirmer: Arc::new(ScriptedConfirmer::new()),
            sequence: RecordingSequence::default(),
            config: EngineConfig::default(),
        }
    }

    fn deps(&self) -> SessionDeps {
        SessionDeps {
            remote: self.backend.clone(),
            storage: Arc::clone(&self.storage),
            confirmer: self.confirmer.clone(),
            sequence: Box::new(self.sequence.clone()),
        }
    }

    pub async fn open(&self, checklist_id: &str) -> Result<ChecklistSession, EngineError> {
        self.open_at(checklist_id, 0, ZoneEntry::First).await
    }

    pub async fn open_at(
        &self,
        checklist_id: &str,
        zone_index: usize,
        entry: ZoneEntry,
    ) -> Result<ChecklistSession, EngineError> {
        ChecklistSession::open(
            ChecklistId::from(checklist_id),
            self.deps(),
            &self.config,
            zone_index,
            entry,
        )
        .await
    }
}
