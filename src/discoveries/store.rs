use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// One persisted plant discovery — the durable unit of the journal.
///
/// Records are immutable once inserted: corrections are delete + recreate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discovery {
    /// Store-assigned unique id; the value carried by a record handed to
    /// insert() is ignored
    pub id: i64,

    /// Identifier of the owning user; every query is scoped by this field
    pub user_id: String,

    /// Resolved scientific name, never empty for a persisted record
    pub plant_name: String,

    /// Encyclopedia description attached at identification time
    pub ai_fact: String,

    /// Absolute path to the permanent JPEG copy; the record and the file
    /// share lifetime (deleting the record deletes the file)
    pub local_image_path: String,

    /// Milliseconds since epoch, set once at creation
    pub timestamp: i64,
}

/// Storage interface for discoveries - implementations are swappable
#[async_trait]
pub trait DiscoveryStore: Send + Sync {
    /// Persist a discovery, assigning a fresh unique id (the incoming id is
    /// ignored). Returns the assigned id. Never overwrites an existing row.
    async fn insert(&self, discovery: &Discovery) -> Result<i64, String>;

    /// Point lookup scoped to the user; absent is not an error
    async fn get_by_id(&self, user_id: &str, id: i64) -> Result<Option<Discovery>, String>;

    /// Remove the row and best-effort delete the backing image file.
    /// A missing file (or already-deleted row) is not an error.
    async fn delete(&self, discovery: &Discovery) -> Result<(), String>;

    /// Case-insensitive substring match on plant_name, scoped to the user,
    /// newest first. An empty query matches every record; whether to show
    /// the filtered or the unfiltered list is the caller's policy.
    async fn search(&self, user_id: &str, query: &str) -> Result<Vec<Discovery>, String>;

    /// Live view of the user's discoveries, newest first. The receiver is
    /// updated after every insert/delete for that user without re-querying.
    fn observe(&self, user_id: &str) -> watch::Receiver<Vec<Discovery>>;

    /// Total number of records for the user
    async fn count(&self, user_id: &str) -> Result<i64, String>;
}
