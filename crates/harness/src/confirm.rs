use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use checklist_engine::{Confirmation, Confirmer, Prompt};

/// Plays back queued answers in order. An empty queue dismisses, like a tap
/// outside the dialog. Every prompt shown is recorded.
#[derive(Default)]
pub struct ScriptedConfirmer {
    answers: Mutex<VecDeque<Confirmation>>,
    shown: Mutex<Vec<Prompt>>,
}

impl ScriptedConfirmer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, answer: Confirmation) {
        self.answers.lock().push_back(answer);
    }

    pub fn shown(&self) -> Vec<Prompt> {
        self.shown.lock().clone()
    }

    pub fn clear_shown(&self) {
        self.shown.lock().clear();
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn confirm(&self, prompt: Prompt) -> Confirmation {
        self.shown.lock().push(prompt);
        self.answers
            .lock()
            .pop_front()
            .unwrap_or(Confirmation::Cancelled)
    }
}
