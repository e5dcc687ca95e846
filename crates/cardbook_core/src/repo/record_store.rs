//! Record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist company groups as one document per group.
//! - Push the full group list to subscribers after every change.
//!
//! # Invariants
//! - `save` with an existing id is an upsert and is idempotent under retry.
//! - `delete` of an absent id is a no-op.
//! - Empty groups are rejected; callers must delete them instead.
//! - One undecodable document never aborts a full load; it becomes a
//!   placeholder group.
//! - Subscribers see snapshots in write order, even under concurrent writers.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::company_group::{CompanyGroup, GroupId};
use crate::model::lenient;
use crate::model::person::Person;
use log::{error, info, warn};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Handle returned by `subscribe`, used to unsubscribe later.
pub type SubscriptionId = u64;

/// Change-feed callback. Receives the entire current list on every change.
///
/// Callbacks run while the store serializes writes and must not call back
/// into the store.
pub type FeedCallback = Box<dyn Fn(&[CompanyGroup]) + Send + Sync>;

/// Record store error.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Group payload could not be encoded for storage.
    Encode(String),
    /// Attempted to save a group without people.
    EmptyGroup(String),
    /// Connection is not migrated to the schema this binary expects.
    SchemaNotReady { found: u32, expected: u32 },
    /// Internal lock was poisoned by a panicking writer.
    LockPoisoned,
    /// Backend refused or failed the operation.
    Rejected(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Encode(message) => write!(f, "failed to encode group: {message}"),
            Self::EmptyGroup(company) => {
                write!(f, "refusing to save empty group `{company}`; delete it instead")
            }
            Self::SchemaNotReady { found, expected } => write!(
                f,
                "record store schema version {found} does not match expected {expected}"
            ),
            Self::LockPoisoned => write!(f, "record store lock poisoned"),
            Self::Rejected(message) => write!(f, "record store rejected operation: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence service for company groups.
///
/// Implementations must be shareable across threads: a resolution commit
/// issues all of its saves and deletes concurrently.
pub trait RecordStore: Send + Sync {
    /// Upserts by id when `group.id` is set, otherwise inserts and returns
    /// the newly assigned id.
    fn save(&self, group: &CompanyGroup) -> StoreResult<GroupId>;
    /// Removes one document; no-op when already absent.
    fn delete(&self, id: &str) -> StoreResult<()>;
    /// Returns every stored group in stable creation order.
    fn load_all(&self) -> StoreResult<Vec<CompanyGroup>>;
    /// Registers a change-feed callback. The current list is pushed
    /// immediately, then again after every change.
    fn subscribe(&self, callback: FeedCallback) -> StoreResult<SubscriptionId>;
    /// Returns whether a subscription was removed.
    fn unsubscribe(&self, id: SubscriptionId) -> StoreResult<bool>;
}

/// Stored document shape. Ids live in the row key, never in the payload.
#[derive(Debug, Deserialize)]
struct GroupDocument {
    #[serde(default, deserialize_with = "lenient")]
    company: String,
    #[serde(default, deserialize_with = "lenient")]
    people: Vec<Person>,
}

#[derive(Serialize)]
struct GroupDocumentRef<'a> {
    company: &'a str,
    people: &'a [Person],
}

/// SQLite-backed record store with an in-process change feed.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
    subscribers: Mutex<BTreeMap<SubscriptionId, FeedCallback>>,
    next_subscription: AtomicU64,
}

impl SqliteRecordStore {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        let found = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
        let expected = latest_version();
        if found != expected {
            return Err(StoreError::SchemaNotReady { found, expected });
        }

        Ok(Self {
            conn: Mutex::new(conn),
            subscribers: Mutex::new(BTreeMap::new()),
            next_subscription: AtomicU64::new(1),
        })
    }

    /// Pushes the current list to every subscriber.
    ///
    /// Callers hold the subscriber lock from their write until this returns,
    /// so snapshots reach subscribers in write order.
    fn notify_subscribers(&self, subscribers: &BTreeMap<SubscriptionId, FeedCallback>) {
        if subscribers.is_empty() {
            return;
        }
        match self.load_all() {
            Ok(groups) => {
                for callback in subscribers.values() {
                    callback(&groups);
                }
            }
            Err(err) => error!("event=feed_push module=store status=error error={err}"),
        }
    }
}

impl RecordStore for SqliteRecordStore {
    fn save(&self, group: &CompanyGroup) -> StoreResult<GroupId> {
        if group.is_empty() {
            return Err(StoreError::EmptyGroup(group.company.clone()));
        }

        let id = group
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let payload = serde_json::to_string(&GroupDocumentRef {
            company: &group.company,
            people: &group.people,
        })
        .map_err(|err| StoreError::Encode(err.to_string()))?;

        let subscribers = self
            .subscribers
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        {
            let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            conn.execute(
                "INSERT INTO card_groups (id, payload) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET
                    payload = excluded.payload,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![id, payload],
            )?;
        }

        info!(
            "event=group_save module=store status=ok group_id={} people={}",
            id,
            group.people.len()
        );
        self.notify_subscribers(&subscribers);
        Ok(id)
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        let subscribers = self
            .subscribers
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        let changed = {
            let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            conn.execute("DELETE FROM card_groups WHERE id = ?1;", [id])?
        };

        info!("event=group_delete module=store status=ok group_id={id} changed={changed}");
        if changed > 0 {
            self.notify_subscribers(&subscribers);
        }
        Ok(())
    }

    fn load_all(&self) -> StoreResult<Vec<CompanyGroup>> {
        let rows = {
            let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            let mut stmt = conn.prepare(
                "SELECT id, payload FROM card_groups ORDER BY created_at ASC, rowid ASC;",
            )?;
            let mapped = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let collected = mapped.collect::<Result<Vec<_>, _>>()?;
            collected
        };

        Ok(rows
            .into_iter()
            .map(|(id, payload)| decode_group(id, &payload))
            .collect())
    }

    fn subscribe(&self, callback: FeedCallback) -> StoreResult<SubscriptionId> {
        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        let current = self.load_all()?;
        callback(&current);

        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        subscribers.insert(id, callback);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> StoreResult<bool> {
        Ok(self
            .subscribers
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .remove(&id)
            .is_some())
    }
}

fn decode_group(id: GroupId, payload: &str) -> CompanyGroup {
    match serde_json::from_str::<GroupDocument>(payload) {
        Ok(document) => {
            let mut group = CompanyGroup::with_people(document.company, document.people);
            group.id = Some(id);
            group
        }
        Err(err) => {
            warn!("event=group_decode module=store status=error group_id={id} error={err}");
            CompanyGroup::unreadable(id, err.to_string())
        }
    }
}
