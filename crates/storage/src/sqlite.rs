use rusqlite::{Connection, OptionalExtension};

use checklist_core::{
    answer::{Answer, Mutation},
    hlc::Hlc,
    ids::*,
};

use crate::error::StorageError;
use crate::traits::{DeliveryStatus, MutationLog, MutationRecord, SnapshotStore};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

/// Millisecond timestamps are stored as INTEGER; saturate instead of wrapping.
fn to_sql_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<MutationRecord>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, RawRow::read)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?.into_record()?);
        }
        Ok(result)
    }
}

const RECORD_COLUMNS: &str = "mutation_id, checklist_id, parameter_id, hlc, payload, status, attempts, next_attempt_at, last_error";

/// Column values as read from SQLite, decoded outside the rusqlite closure so
/// decoding failures surface as `StorageError` rather than `rusqlite::Error`.
struct RawRow {
    mutation_id: Vec<u8>,
    checklist_id: String,
    parameter_id: String,
    hlc: Vec<u8>,
    payload: Vec<u8>,
    status: String,
    attempts: i64,
    next_attempt_at: i64,
    last_error: Option<String>,
}

impl RawRow {
    fn read(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            mutation_id: row.get(0)?,
            checklist_id: row.get(1)?,
            parameter_id: row.get(2)?,
            hlc: row.get(3)?,
            payload: row.get(4)?,
            status: row.get(5)?,
            attempts: row.get(6)?,
            next_attempt_at: row.get(7)?,
            last_error: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<MutationRecord, StorageError> {
        let mutation = Mutation {
            mutation_id: MutationId::from_bytes(to_array::<16>(self.mutation_id, "mutation_id")?),
            checklist_id: ChecklistId::new(self.checklist_id),
            parameter_id: ParameterId::new(self.parameter_id),
            hlc: Hlc::from_bytes(&to_array::<12>(self.hlc, "hlc")?),
            answer: Answer::from_msgpack(&self.payload)?,
        };
        Ok(MutationRecord {
            mutation,
            status: DeliveryStatus::parse(&self.status)?,
            attempts: self.attempts.max(0) as u32,
            next_attempt_at: self.next_attempt_at.max(0) as u64,
            last_error: self.last_error,
        })
    }
}

impl MutationLog for SqliteStorage {
    fn append(&mut self, mutation: &Mutation) -> Result<(), StorageError> {
        let payload = mutation.answer.to_msgpack()?;
        self.conn.execute(
            "INSERT INTO mutations (mutation_id, checklist_id, parameter_id, field_name, hlc, payload) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                mutation.mutation_id.as_bytes().as_slice(),
                mutation.checklist_id.as_str(),
                mutation.parameter_id.as_str(),
                mutation.field_name(),
                &mutation.hlc.to_bytes()[..],
                payload,
            ],
        )?;
        Ok(())
    }

    fn get_mutation(&self, mutation_id: MutationId) -> Result<Option<MutationRecord>, StorageError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM mutations WHERE mutation_id = ?1");
        let raw = self
            .conn
            .query_row(
                &sql,
                rusqlite::params![mutation_id.as_bytes().as_slice()],
                RawRow::read,
            )
            .optional()?;
        raw.map(RawRow::into_record).transpose()
    }

    fn mark_delivered(&mut self, mutation_id: MutationId) -> Result<bool, StorageError> {
        let changed = self.conn.execute(
            "UPDATE mutations SET status = 'delivered', last_error = NULL WHERE mutation_id = ?1 AND status = 'pending'",
            rusqlite::params![mutation_id.as_bytes().as_slice()],
        )?;
        Ok(changed > 0)
    }

    fn record_failure(
        &mut self,
        mutation_id: MutationId,
        error: &str,
        next_attempt_at: u64,
    ) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE mutations SET attempts = attempts + 1, last_error = ?1, next_attempt_at = ?2 WHERE mutation_id = ?3",
            rusqlite::params![
                error,
                to_sql_ms(next_attempt_at),
                mutation_id.as_bytes().as_slice(),
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(mutation_id.to_string()));
        }
        Ok(())
    }

    fn due(&self, now_ms: u64) -> Result<Vec<MutationRecord>, StorageError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM mutations WHERE status = 'pending' AND next_attempt_at <= ?1 ORDER BY hlc, rowid"
        );
        self.query_records(&sql, rusqlite::params![to_sql_ms(now_ms)])
    }

    fn pending_for_parameter(
        &self,
        checklist_id: &ChecklistId,
        parameter_id: &ParameterId,
    ) -> Result<Vec<MutationRecord>, StorageError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM mutations WHERE status = 'pending' AND checklist_id = ?1 AND parameter_id = ?2 ORDER BY hlc, rowid"
        );
        self.query_records(
            &sql,
            rusqlite::params![checklist_id.as_str(), parameter_id.as_str()],
        )
    }

    fn supersede_older(&mut self, mutation: &Mutation) -> Result<usize, StorageError> {
        let changed = self.conn.execute(
            "UPDATE mutations SET status = 'superseded'
             WHERE status = 'pending' AND checklist_id = ?1 AND parameter_id = ?2 AND field_name = ?3 AND hlc < ?4",
            rusqlite::params![
                mutation.checklist_id.as_str(),
                mutation.parameter_id.as_str(),
                mutation.field_name(),
                &mutation.hlc.to_bytes()[..],
            ],
        )?;
        Ok(changed)
    }

    fn pending_count(&self) -> Result<u64, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM mutations WHERE status = 'pending'",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl SnapshotStore for SqliteStorage {
    fn save_snapshot(
        &mut self,
        checklist_id: &ChecklistId,
        body: &str,
        fetched_at: u64,
    ) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO checklist_snapshots (checklist_id, body, fetched_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(checklist_id) DO UPDATE SET body = excluded.body, fetched_at = excluded.fetched_at",
            rusqlite::params![checklist_id.as_str(), body, to_sql_ms(fetched_at)],
        )?;
        Ok(())
    }

    fn load_snapshot(&self, checklist_id: &ChecklistId) -> Result<Option<String>, StorageError> {
        let body = self
            .conn
            .query_row(
                "SELECT body FROM checklist_snapshots WHERE checklist_id = ?1",
                rusqlite::params![checklist_id.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checklist_core::answer::AnswerValue;

    fn text_mutation(parameter: &str, field: &str, value: &str, hlc: Hlc) -> Mutation {
        Mutation::new(
            ChecklistId::from("17"),
            ParameterId::from(parameter),
            hlc,
            Answer::value(field, AnswerValue::Text(value.into())),
        )
    }

    #[test]
    fn append_then_deliver() -> Result<(), StorageError> {
        let mut storage = SqliteStorage::open_in_memory()?;
        let m = text_mutation("p1", "note", "следы грызунов", Hlc::new(10, 0));
        storage.append(&m)?;
        assert_eq!(storage.pending_count()?, 1);

        let record = storage.get_mutation(m.mutation_id)?.expect("stored");
        assert_eq!(record.mutation, m);
        assert_eq!(record.status, DeliveryStatus::Pending);

        assert!(storage.mark_delivered(m.mutation_id)?);
        assert!(!storage.mark_delivered(m.mutation_id)?);
        assert_eq!(storage.pending_count()?, 0);
        Ok(())
    }

    #[test]
    fn failure_defers_until_next_attempt() -> Result<(), StorageError> {
        let mut storage = SqliteStorage::open_in_memory()?;
        let m = text_mutation("p1", "note", "abcde", Hlc::new(10, 0));
        storage.append(&m)?;
        storage.record_failure(m.mutation_id, "503", 5_000)?;

        assert!(storage.due(4_999)?.is_empty());
        let due = storage.due(5_000)?;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].attempts, 1);
        assert_eq!(due[0].last_error.as_deref(), Some("503"));
        Ok(())
    }

    #[test]
    fn newer_answer_supersedes_older_for_same_field() -> Result<(), StorageError> {
        let mut storage = SqliteStorage::open_in_memory()?;
        let old = text_mutation("p1", "note", "first", Hlc::new(10, 0));
        let other_field = text_mutation("p1", "comment", "keep", Hlc::new(11, 0));
        let new = text_mutation("p1", "note", "second", Hlc::new(12, 0));
        storage.append(&old)?;
        storage.append(&other_field)?;
        storage.append(&new)?;

        assert_eq!(storage.supersede_older(&new)?, 1);
        let pending = storage.pending_for_parameter(&new.checklist_id, &new.parameter_id)?;
        let names: Vec<_> = pending.iter().map(|r| r.mutation.field_name()).collect();
        assert_eq!(names, vec!["comment", "note"]);
        assert_eq!(
            storage.get_mutation(old.mutation_id)?.map(|r| r.status),
            Some(DeliveryStatus::Superseded)
        );
        Ok(())
    }

    #[test]
    fn snapshot_upsert() -> Result<(), StorageError> {
        let mut storage = SqliteStorage::open_in_memory()?;
        let id = ChecklistId::from("9");
        assert_eq!(storage.load_snapshot(&id)?, None);
        storage.save_snapshot(&id, "{\"v\":1}", 1)?;
        storage.save_snapshot(&id, "{\"v\":2}", 2)?;
        assert_eq!(storage.load_snapshot(&id)?.as_deref(), Some("{\"v\":2}"));
        Ok(())
    }

    #[test]
    fn file_backed_log_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("outbox.db");
        let path = path.to_str().ok_or("non-utf8 temp path")?;
        let m = text_mutation("p2", "note", "offline edit", Hlc::new(20, 0));
        {
            let mut storage = SqliteStorage::open(path)?;
            storage.append(&m)?;
        }
        let storage = SqliteStorage::open(path)?;
        let pending = storage.pending_for_parameter(&m.checklist_id, &m.parameter_id)?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].mutation.answer, m.answer);
        Ok(())
    }
}
