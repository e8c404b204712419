//! The checkpoint store: thread lifecycle, snapshots, turn locks.

use parking_lot::Mutex;
use rusqlite::{OptionalExtension, params};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use concierge_core::ids::ThreadId;
use concierge_core::state::{ConversationState, STATE_SCHEMA_VERSION, UserProfile};

use crate::connection::ConnectionPool;
use crate::errors::{Result, StoreError};

/// One row of the thread listing.
#[derive(Clone, Debug)]
pub struct ThreadSummary {
    /// Thread ID.
    pub thread_id: ThreadId,
    /// Owning user.
    pub user: UserProfile,
    /// Whether the thread is archived.
    pub archived: bool,
    /// Creation timestamp (SQLite `datetime('now')` text).
    pub created_at: String,
    /// Last checkpoint timestamp.
    pub updated_at: String,
}

/// RAII guard for an in-flight turn. Dropping it releases the thread.
#[derive(Debug)]
pub struct TurnGuard {
    thread_id: ThreadId,
    busy: Arc<Mutex<HashSet<ThreadId>>>,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        let _ = self.busy.lock().remove(&self.thread_id);
    }
}

/// Append-only checkpoint store over SQLite.
///
/// Cloneable; clones share the pool and the turn-lock set.
#[derive(Clone)]
pub struct CheckpointStore {
    pool: ConnectionPool,
    busy: Arc<Mutex<HashSet<ThreadId>>>,
}

impl CheckpointStore {
    /// Wrap a migrated pool.
    #[must_use]
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool,
            busy: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Create a thread for the given user and checkpoint its fresh state.
    #[instrument(skip_all)]
    pub fn create_thread(&self, user: &UserProfile) -> Result<ThreadId> {
        let thread_id = ThreadId::new();
        let conn = self.pool.get()?;
        let _ = conn.execute(
            "INSERT INTO threads (id, user_json) VALUES (?, ?)",
            params![thread_id.as_str(), serde_json::to_string(user)?],
        )?;
        drop(conn);
        let state = ConversationState::new(user.clone());
        let _ = self.save(&thread_id, &state)?;
        info!(thread_id = %thread_id, "thread created");
        Ok(thread_id)
    }

    /// Append a snapshot of the thread state. Returns the new sequence
    /// number.
    #[instrument(skip_all, fields(thread_id = %thread_id))]
    pub fn save(&self, thread_id: &ThreadId, state: &ConversationState) -> Result<i64> {
        let conn = self.pool.get()?;
        self.require_thread(&conn, thread_id)?;
        let seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM checkpoints WHERE thread_id = ?",
            params![thread_id.as_str()],
            |row| row.get(0),
        )?;
        let _ = conn.execute(
            "INSERT INTO checkpoints (thread_id, seq, schema_version, state_json)
             VALUES (?, ?, ?, ?)",
            params![
                thread_id.as_str(),
                seq,
                STATE_SCHEMA_VERSION,
                serde_json::to_string(state)?
            ],
        )?;
        let _ = conn.execute(
            "UPDATE threads SET updated_at = datetime('now') WHERE id = ?",
            params![thread_id.as_str()],
        )?;
        debug!(seq, "checkpoint saved");
        Ok(seq)
    }

    /// Load the latest snapshot for a thread.
    ///
    /// Fails with [`StoreError::SchemaVersionAhead`] if the snapshot was
    /// written by a newer build; older snapshots deserialize via serde
    /// defaults.
    #[instrument(skip_all, fields(thread_id = %thread_id))]
    pub fn load(&self, thread_id: &ThreadId) -> Result<ConversationState> {
        let conn = self.pool.get()?;
        self.require_thread(&conn, thread_id)?;
        let row: Option<(u32, String)> = conn
            .query_row(
                "SELECT schema_version, state_json FROM checkpoints
                 WHERE thread_id = ? ORDER BY seq DESC LIMIT 1",
                params![thread_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (schema_version, state_json) = row.ok_or_else(|| StoreError::ThreadNotFound {
            thread_id: thread_id.to_string(),
        })?;
        if schema_version > STATE_SCHEMA_VERSION {
            return Err(StoreError::SchemaVersionAhead {
                found: schema_version,
                supported: STATE_SCHEMA_VERSION,
            });
        }
        Ok(serde_json::from_str(&state_json)?)
    }

    /// Latest checkpoint sequence number for a thread.
    pub fn latest_seq(&self, thread_id: &ThreadId) -> Result<i64> {
        let conn = self.pool.get()?;
        let seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) FROM checkpoints WHERE thread_id = ?",
            params![thread_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(seq)
    }

    /// List threads, newest activity first.
    pub fn list_threads(&self, include_archived: bool) -> Result<Vec<ThreadSummary>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_json, archived, created_at, updated_at FROM threads
             WHERE archived <= ?
             ORDER BY updated_at DESC",
        )?;
        let rows: Vec<(String, String, bool, String, String)> = stmt
            .query_map(params![i32::from(include_archived)], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<rusqlite::Result<_>>()?;

        rows.into_iter()
            .map(|(id, user_json, archived, created_at, updated_at)| {
                Ok(ThreadSummary {
                    thread_id: ThreadId::from(id),
                    user: serde_json::from_str(&user_json)?,
                    archived,
                    created_at,
                    updated_at,
                })
            })
            .collect()
    }

    /// Mark a thread archived. Its checkpoints remain readable.
    pub fn archive_thread(&self, thread_id: &ThreadId) -> Result<()> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE threads SET archived = 1, updated_at = datetime('now') WHERE id = ?",
            params![thread_id.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::ThreadNotFound {
                thread_id: thread_id.to_string(),
            });
        }
        info!(thread_id = %thread_id, "thread archived");
        Ok(())
    }

    /// Claim the thread for a turn. Fails with [`StoreError::ThreadBusy`]
    /// while another turn holds the guard.
    pub fn begin_turn(&self, thread_id: &ThreadId) -> Result<TurnGuard> {
        let mut busy = self.busy.lock();
        if !busy.insert(thread_id.clone()) {
            return Err(StoreError::ThreadBusy {
                thread_id: thread_id.to_string(),
            });
        }
        Ok(TurnGuard {
            thread_id: thread_id.clone(),
            busy: Arc::clone(&self.busy),
        })
    }

    fn require_thread(
        &self,
        conn: &rusqlite::Connection,
        thread_id: &ThreadId,
    ) -> Result<()> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM threads WHERE id = ?)",
            params![thread_id.as_str()],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(StoreError::ThreadNotFound {
                thread_id: thread_id.to_string(),
            })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection;
    use assert_matches::assert_matches;
    use concierge_core::context::{ContextId, StackOp};
    use concierge_core::ids::ToolCallId;
    use concierge_core::messages::{Message, ToolCall};
    use concierge_core::state::PendingInterrupt;
    use serde_json::Map;

    fn store() -> CheckpointStore {
        CheckpointStore::new(connection::new_in_memory().unwrap())
    }

    fn user() -> UserProfile {
        UserProfile::new(1, "Alex")
    }

    // -- lifecycle --

    #[test]
    fn create_then_load_fresh_state() {
        let store = store();
        let thread_id = store.create_thread(&user()).unwrap();
        let state = store.load(&thread_id).unwrap();
        assert!(state.messages.is_empty());
        assert_eq!(state.active_context(), ContextId::Primary);
        assert_eq!(store.latest_seq(&thread_id).unwrap(), 1);
    }

    #[test]
    fn save_appends_monotonic_seq() {
        let store = store();
        let thread_id = store.create_thread(&user()).unwrap();
        let mut state = store.load(&thread_id).unwrap();
        state.push_message(Message::user("hi"));
        assert_eq!(store.save(&thread_id, &state).unwrap(), 2);
        state.push_message(Message::assistant("hello"));
        assert_eq!(store.save(&thread_id, &state).unwrap(), 3);

        let loaded = store.load(&thread_id).unwrap();
        assert_eq!(loaded.messages.len(), 2);
    }

    #[test]
    fn load_restores_mid_interrupt_state() {
        let store = store();
        let thread_id = store.create_thread(&user()).unwrap();
        let mut state = store.load(&thread_id).unwrap();
        state.push_message(Message::user("cancel order 1"));
        state.apply_stack_op(StackOp::Push {
            context: ContextId::Order,
        });
        state.pending = Some(PendingInterrupt {
            context: ContextId::Order,
            tool_calls: vec![ToolCall::new(
                ToolCallId::from("tc-1"),
                "CancelOrder",
                Map::new(),
            )],
        });
        let _ = store.save(&thread_id, &state).unwrap();

        // A fresh store over the same pool simulates a process restart.
        let reopened = CheckpointStore::new(store.pool.clone());
        let loaded = reopened.load(&thread_id).unwrap();
        assert_eq!(loaded, state);
        assert!(loaded.is_interrupted());
        assert_eq!(loaded.active_context(), ContextId::Order);
    }

    #[test]
    fn unknown_thread_errors() {
        let store = store();
        let missing = ThreadId::from("nope");
        assert_matches!(
            store.load(&missing),
            Err(StoreError::ThreadNotFound { .. })
        );
        assert_matches!(
            store.save(&missing, &ConversationState::new(user())),
            Err(StoreError::ThreadNotFound { .. })
        );
        assert_matches!(
            store.archive_thread(&missing),
            Err(StoreError::ThreadNotFound { .. })
        );
    }

    #[test]
    fn newer_schema_version_refused() {
        let store = store();
        let thread_id = store.create_thread(&user()).unwrap();
        {
            let conn = store.pool.get().unwrap();
            let _ = conn
                .execute(
                    "INSERT INTO checkpoints (thread_id, seq, schema_version, state_json)
                     VALUES (?, 99, 999, '{}')",
                    params![thread_id.as_str()],
                )
                .unwrap();
        }
        assert_matches!(
            store.load(&thread_id),
            Err(StoreError::SchemaVersionAhead {
                found: 999,
                ..
            })
        );
    }

    // -- listing and archive --

    #[test]
    fn archived_threads_hidden_by_default() {
        let store = store();
        let a = store.create_thread(&user()).unwrap();
        let _b = store.create_thread(&user()).unwrap();
        store.archive_thread(&a).unwrap();

        assert_eq!(store.list_threads(false).unwrap().len(), 1);
        assert_eq!(store.list_threads(true).unwrap().len(), 2);
    }

    // -- turn locks --

    #[test]
    fn second_turn_on_same_thread_is_busy() {
        let store = store();
        let thread_id = store.create_thread(&user()).unwrap();
        let guard = store.begin_turn(&thread_id).unwrap();
        assert_matches!(
            store.begin_turn(&thread_id),
            Err(StoreError::ThreadBusy { .. })
        );
        drop(guard);
        assert!(store.begin_turn(&thread_id).is_ok());
    }

    #[test]
    fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threads.db");
        let path_str = path.to_string_lossy();

        let thread_id;
        let mut state;
        {
            let pool =
                connection::new_file(&path_str, &connection::ConnectionConfig::default())
                    .unwrap();
            let store = CheckpointStore::new(pool);
            thread_id = store.create_thread(&user()).unwrap();
            state = store.load(&thread_id).unwrap();
            state.push_message(Message::user("add the mouse"));
            state.pending = Some(PendingInterrupt {
                context: ContextId::Cart,
                tool_calls: vec![ToolCall::new(
                    ToolCallId::from("tc-1"),
                    "AddToCart",
                    Map::new(),
                )],
            });
            let _ = store.save(&thread_id, &state).unwrap();
        }

        // New pool over the same file: a real restart, not a shared handle.
        let pool = connection::new_file(&path_str, &connection::ConnectionConfig::default())
            .unwrap();
        let store = CheckpointStore::new(pool);
        let loaded = store.load(&thread_id).unwrap();
        assert_eq!(loaded, state);
        assert!(loaded.is_interrupted());
    }

    #[test]
    fn turn_locks_are_per_thread() {
        let store = store();
        let a = store.create_thread(&user()).unwrap();
        let b = store.create_thread(&user()).unwrap();
        let _guard_a = store.begin_turn(&a).unwrap();
        assert!(store.begin_turn(&b).is_ok());
    }
}
