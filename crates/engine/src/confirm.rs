//! Confirmation requests as an explicit suspension point.
//!
//! Commit checks never talk to a dialog. They return a [`Decision`]; when it
//! is `Ask`, the caller obtains a [`Confirmation`] from a [`Confirmer`] (or
//! from the UI later) and applies the matching [`Resolution`].

use async_trait::async_trait;

use checklist_core::FieldViewModel;
use checklist_core::field::TmcPart;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Remaining stock was entered above the carried-in amount. Notice only:
    /// both answers clamp.
    StockAboveCarried { label: String, carried: String },
    StockConsumed { label: String, consumed: String },
    EmptyInventory { label: String },
    PestCount { label: String, count: String },
    /// Soft navigation warning.
    IncompleteParameter,
}

impl Prompt {
    pub fn message(&self) -> String {
        match self {
            Self::StockAboveCarried { label, carried } => format!(
                "{label}: остаток не может быть больше привезённого количества ({carried})"
            ),
            Self::StockConsumed { label, consumed } => {
                format!("{label}: подтвердите расход {consumed}")
            }
            Self::EmptyInventory { label } => {
                format!("{label}: точка учёта останется пустой. Подтвердить?")
            }
            Self::PestCount { label, count } => {
                format!("{label}: обнаружено {count}. Подтвердить?")
            }
            Self::IncompleteParameter => "Необходимо заполнить все поля".to_string(),
        }
    }
}

/// Dismissing a dialog by tapping outside counts as `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Cancelled,
}

#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, prompt: Prompt) -> Confirmation;
}

/// What a commit finally does to its field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Keep the entered value, mark it valid and send it.
    Send,
    /// Overwrite one stock sub-value, mark it valid, send nothing.
    Clamp { part: TmcPart, value: String },
    /// Put the pest count back to zero locally, send nothing.
    ResetPest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Apply(Resolution),
    Ask {
        prompt: Prompt,
        on_confirm: Resolution,
        on_cancel: Resolution,
    },
    /// Nothing to commit.
    Skip,
}

/// A question left open by a commit, resumable with
/// `ChecklistSession::resolve_confirmation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    pub zone_index: usize,
    pub parameter_index: usize,
    pub field_name: String,
    /// Stock sub-value being committed; `None` for pest counts.
    pub part: Option<TmcPart>,
    /// The field as it stood when the commit asked; its committed value is
    /// what the resolution applies to.
    pub field: FieldViewModel,
    pub prompt: Prompt,
    pub on_confirm: Resolution,
    pub on_cancel: Resolution,
}

impl PendingConfirmation {
    pub fn resolution(&self, answer: Confirmation) -> &Resolution {
        match answer {
            Confirmation::Confirmed => &self.on_confirm,
            Confirmation::Cancelled => &self.on_cancel,
        }
    }
}

/// Answers every prompt with `Cancelled`, like a user tapping outside.
#[derive(Debug, Default, Clone, Copy)]
pub struct DismissAll;

#[async_trait]
impl Confirmer for DismissAll {
    async fn confirm(&self, _prompt: Prompt) -> Confirmation {
        Confirmation::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checklist_core::field::TmcField;

    fn pending() -> PendingConfirmation {
        PendingConfirmation {
            zone_index: 0,
            parameter_index: 1,
            field_name: "tmc_12".into(),
            part: Some(TmcPart::Remaining),
            field: FieldViewModel::Tmc(TmcField {
                name: "tmc_12".into(),
                ..TmcField::default()
            }),
            prompt: Prompt::StockConsumed {
                label: "Родентицид".into(),
                consumed: "3".into(),
            },
            on_confirm: Resolution::Send,
            on_cancel: Resolution::Clamp {
                part: TmcPart::Remaining,
                value: "10".into(),
            },
        }
    }

    #[test]
    fn answer_picks_resolution() {
        let pending = pending();
        assert_eq!(pending.resolution(Confirmation::Confirmed), &Resolution::Send);
        assert!(matches!(
            pending.resolution(Confirmation::Cancelled),
            Resolution::Clamp { value, .. } if value == "10"
        ));
    }

    #[test]
    fn messages_name_the_item() {
        assert_eq!(pending().prompt.message(), "Родентицид: подтвердите расход 3");
        assert_eq!(
            Prompt::IncompleteParameter.message(),
            "Необходимо заполнить все поля"
        );
    }

    #[tokio::test]
    async fn dismiss_all_cancels() {
        let answer = DismissAll.confirm(Prompt::IncompleteParameter).await;
        assert_eq!(answer, Confirmation::Cancelled);
    }
}
