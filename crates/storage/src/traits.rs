use checklist_core::{
    answer::Mutation,
    ids::*,
};

use crate::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Superseded,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Superseded => "superseded",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StorageError> {
        match s {
            "pending" => Ok(Self::Pending),
            "delivered" => Ok(Self::Delivered),
            "superseded" => Ok(Self::Superseded),
            _ => Err(StorageError::Serialization(format!(
                "unknown delivery status: {s}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub mutation: Mutation,
    pub status: DeliveryStatus,
    pub attempts: u32,
    /// Earliest wall-clock ms at which a retry may be sent.
    pub next_attempt_at: u64,
    pub last_error: Option<String>,
}

/// Durable outbox of committed answers.
pub trait MutationLog {
    fn append(&mut self, mutation: &Mutation) -> Result<(), StorageError>;

    fn get_mutation(&self, mutation_id: MutationId) -> Result<Option<MutationRecord>, StorageError>;

    /// Returns false when the mutation was no longer pending.
    fn mark_delivered(&mut self, mutation_id: MutationId) -> Result<bool, StorageError>;

    fn record_failure(
        &mut self,
        mutation_id: MutationId,
        error: &str,
        next_attempt_at: u64,
    ) -> Result<(), StorageError>;

    /// Pending mutations whose retry time has come, oldest stamp first.
    fn due(&self, now_ms: u64) -> Result<Vec<MutationRecord>, StorageError>;

    /// Pending mutations of one parameter, oldest stamp first.
    fn pending_for_parameter(
        &self,
        checklist_id: &ChecklistId,
        parameter_id: &ParameterId,
    ) -> Result<Vec<MutationRecord>, StorageError>;

    /// Mark pending mutations for the same field with an older stamp as
    /// superseded. Returns how many were affected.
    fn supersede_older(&mut self, mutation: &Mutation) -> Result<usize, StorageError>;

    fn pending_count(&self) -> Result<u64, StorageError>;
}

/// Last successfully fetched checklist body, for offline start.
pub trait SnapshotStore {
    fn save_snapshot(
        &mut self,
        checklist_id: &ChecklistId,
        body: &str,
        fetched_at: u64,
    ) -> Result<(), StorageError>;

    fn load_snapshot(&self, checklist_id: &ChecklistId) -> Result<Option<String>, StorageError>;
}
