use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub struct SqliteDiscoveryStore {
    conn: Arc<Mutex<Connection>>,
    // One watch channel per observed user, refreshed after every mutation
    watchers: Mutex<HashMap<String, watch::Sender<Vec<Discovery>>>>,
}

impl SqliteDiscoveryStore {
    /// Initialize store at ~/.mybloom/discoveries.db
    pub fn new() -> Result<Self, String> {
        let home = dirs::home_dir()
            .ok_or("Could not find home directory")?;
        let db_path = home.join(".mybloom").join("discoveries.db");

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create .mybloom directory: {}", e))?;
        }

        let conn = Connection::open(&db_path)
            .map_err(|e| format!("Failed to open database: {}", e))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            watchers: Mutex::new(HashMap::new()),
        };

        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize in-memory store for testing
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory()
            .map_err(|e| format!("Failed to open in-memory database: {}", e))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            watchers: Mutex::new(HashMap::new()),
        };

        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), String> {
        let conn = self.conn.lock()
            .map_err(|e| format!("Failed to acquire lock: {}", e))?;

        // AUTOINCREMENT keeps ids unique forever: rowids of deleted
        // discoveries are never handed out again.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS discoveries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                plant_name TEXT NOT NULL,
                ai_fact TEXT NOT NULL,
                local_image_path TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )",
            [],
        ).map_err(|e| format!("Failed to create discoveries table: {}", e))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_discoveries_user
             ON discoveries(user_id)",
            [],
        ).map_err(|e| format!("Failed to create user index: {}", e))?;

        Ok(())
    }
}

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use crate::discoveries::store::{Discovery, DiscoveryStore};
use crate::files::ImageFileManager;

const SELECT_COLUMNS: &str = "id, user_id, plant_name, ai_fact, local_image_path, timestamp";

/// Escape LIKE wildcards so a query string always means a literal substring
fn escape_like(query: &str) -> String {
    query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

impl SqliteDiscoveryStore {
    fn row_to_discovery(row: &rusqlite::Row) -> rusqlite::Result<Discovery> {
        Ok(Discovery {
            id: row.get(0)?,
            user_id: row.get(1)?,
            plant_name: row.get(2)?,
            ai_fact: row.get(3)?,
            local_image_path: row.get(4)?,
            timestamp: row.get(5)?,
        })
    }

    fn list_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Discovery>, String> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM discoveries WHERE user_id = ?1 ORDER BY timestamp DESC, id DESC",
            SELECT_COLUMNS
        )).map_err(|e| format!("Failed to prepare list query: {}", e))?;

        let rows = stmt.query_map(params![user_id], Self::row_to_discovery)
            .map_err(|e| format!("Failed to query discoveries: {}", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("Failed to collect discoveries: {}", e));
        rows
    }

    /// Push a fresh snapshot to the user's watch channel, if one exists
    fn notify_watchers(&self, user_id: &str) -> Result<(), String> {
        let snapshot = {
            let conn = self.conn.lock()
                .map_err(|e| format!("Failed to acquire lock: {}", e))?;
            Self::list_for_user(&conn, user_id)?
        };

        let watchers = self.watchers.lock()
            .map_err(|e| format!("Failed to acquire watchers lock: {}", e))?;
        if let Some(sender) = watchers.get(user_id) {
            sender.send_replace(snapshot);
        }
        Ok(())
    }
}

#[async_trait]
impl DiscoveryStore for SqliteDiscoveryStore {
    async fn insert(&self, discovery: &Discovery) -> Result<i64, String> {
        let id = {
            let conn = self.conn.lock()
                .map_err(|e| format!("Failed to acquire lock: {}", e))?;

            conn.execute(
                "INSERT INTO discoveries (user_id, plant_name, ai_fact, local_image_path, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    discovery.user_id,
                    discovery.plant_name,
                    discovery.ai_fact,
                    discovery.local_image_path,
                    discovery.timestamp,
                ],
            ).map_err(|e| format!("Failed to insert discovery: {}", e))?;

            conn.last_insert_rowid()
        };

        self.notify_watchers(&discovery.user_id)?;
        Ok(id)
    }

    async fn get_by_id(&self, user_id: &str, id: i64) -> Result<Option<Discovery>, String> {
        let conn = self.conn.lock()
            .map_err(|e| format!("Failed to acquire lock: {}", e))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM discoveries WHERE user_id = ?1 AND id = ?2",
            SELECT_COLUMNS
        )).map_err(|e| format!("Failed to prepare query: {}", e))?;

        stmt.query_row(params![user_id, id], Self::row_to_discovery)
            .optional()
            .map_err(|e| format!("Failed to query discovery: {}", e))
    }

    async fn delete(&self, discovery: &Discovery) -> Result<(), String> {
        {
            let conn = self.conn.lock()
                .map_err(|e| format!("Failed to acquire lock: {}", e))?;

            let rows_affected = conn.execute(
                "DELETE FROM discoveries WHERE user_id = ?1 AND id = ?2",
                params![discovery.user_id, discovery.id],
            ).map_err(|e| format!("Failed to delete discovery: {}", e))?;

            if rows_affected == 0 {
                eprintln!(
                    "Discoveries: Delete of id {} for user {} matched no row",
                    discovery.id, discovery.user_id
                );
            }
        }

        // The record and its image share lifetime; a missing file is fine
        if let Err(e) = ImageFileManager::delete_image(
            std::path::Path::new(&discovery.local_image_path),
        ) {
            eprintln!("Discoveries: Image cleanup failed: {}", e);
        }

        self.notify_watchers(&discovery.user_id)?;
        Ok(())
    }

    async fn search(&self, user_id: &str, query: &str) -> Result<Vec<Discovery>, String> {
        let conn = self.conn.lock()
            .map_err(|e| format!("Failed to acquire lock: {}", e))?;

        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM discoveries
             WHERE user_id = ?1 AND LOWER(plant_name) LIKE ?2 ESCAPE '\\'
             ORDER BY timestamp DESC, id DESC",
            SELECT_COLUMNS
        )).map_err(|e| format!("Failed to prepare search statement: {}", e))?;

        let rows = stmt.query_map(params![user_id, pattern], Self::row_to_discovery)
            .map_err(|e| format!("Failed to search discoveries: {}", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("Failed to collect search results: {}", e));
        rows
    }

    fn observe(&self, user_id: &str) -> watch::Receiver<Vec<Discovery>> {
        // Recover the data on poison rather than panicking the observer;
        // a panicked writer left the map/connection intact
        let mut watchers = self.watchers.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(sender) = watchers.get(user_id) {
            return sender.subscribe();
        }

        let initial = {
            let conn = self.conn.lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Self::list_for_user(&conn, user_id).unwrap_or_else(|e| {
                eprintln!("Discoveries: Failed to load initial snapshot: {}", e);
                Vec::new()
            })
        };

        let (sender, receiver) = watch::channel(initial);
        watchers.insert(user_id.to_string(), sender);
        receiver
    }

    async fn count(&self, user_id: &str) -> Result<i64, String> {
        let conn = self.conn.lock()
            .map_err(|e| format!("Failed to acquire lock: {}", e))?;

        conn.query_row(
            "SELECT COUNT(*) FROM discoveries WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        ).map_err(|e| format!("Failed to count discoveries: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(user_id: &str, plant_name: &str, timestamp: i64) -> Discovery {
        Discovery {
            id: 0,
            user_id: user_id.to_string(),
            plant_name: plant_name.to_string(),
            ai_fact: format!("{} is a plant.", plant_name),
            local_image_path: format!("/tmp/does-not-exist/plant_{}.jpg", timestamp),
            timestamp,
        }
    }

    #[test]
    fn test_schema_initialization_creates_discoveries_table() {
        let store = SqliteDiscoveryStore::new_in_memory()
            .expect("Failed to create in-memory store");

        let conn = store.conn.lock().unwrap();

        let table_exists: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='discoveries'",
                [],
                |row| row.get(0),
            )
            .map(|count: i32| count == 1)
            .unwrap_or(false);

        assert!(table_exists, "discoveries table should exist");

        let mut stmt = conn.prepare("PRAGMA table_info(discoveries)").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        let expected_columns = vec![
            "id", "user_id", "plant_name", "ai_fact", "local_image_path", "timestamp",
        ];
        assert_eq!(columns, expected_columns, "discoveries table should have correct columns");
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_round_trips() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        let discovery = sample("user-1", "Rosa gallica", 1_000);
        let id = store.insert(&discovery).await.expect("Insert should succeed");
        assert!(id > 0, "Assigned id should be positive");

        let retrieved = store.get_by_id("user-1", id).await.unwrap()
            .expect("Inserted discovery should be retrievable");

        assert_eq!(retrieved.id, id);
        assert_eq!(retrieved.user_id, discovery.user_id);
        assert_eq!(retrieved.plant_name, discovery.plant_name);
        assert_eq!(retrieved.ai_fact, discovery.ai_fact);
        assert_eq!(retrieved.local_image_path, discovery.local_image_path);
        assert_eq!(retrieved.timestamp, discovery.timestamp);
    }

    #[tokio::test]
    async fn test_insert_ignores_caller_supplied_id() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        let mut discovery = sample("user-1", "Rosa gallica", 1_000);
        discovery.id = 999;

        let id = store.insert(&discovery).await.unwrap();
        assert_ne!(id, 999, "Caller-supplied id must be ignored");
        assert!(store.get_by_id("user-1", 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_assigns_distinct_ids() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        let first = store.insert(&sample("user-1", "Rosa gallica", 1)).await.unwrap();
        let second = store.insert(&sample("user-1", "Rosa canina", 2)).await.unwrap();

        assert_ne!(first, second, "Each insert gets a fresh id");
    }

    #[tokio::test]
    async fn test_deleted_ids_are_never_reused() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        let mut discovery = sample("user-1", "Rosa gallica", 1);
        let first = store.insert(&discovery).await.unwrap();
        discovery.id = first;
        store.delete(&discovery).await.unwrap();

        let second = store.insert(&sample("user-1", "Rosa canina", 2)).await.unwrap();
        assert!(second > first, "AUTOINCREMENT must not recycle the deleted id");
    }

    #[tokio::test]
    async fn test_get_by_id_is_user_scoped() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        let id = store.insert(&sample("user-1", "Rosa gallica", 1)).await.unwrap();

        assert!(store.get_by_id("user-1", id).await.unwrap().is_some());
        assert!(
            store.get_by_id("user-2", id).await.unwrap().is_none(),
            "Another user must not see the record"
        );
    }

    #[tokio::test]
    async fn test_get_by_id_absent_is_none_not_error() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();
        assert!(store.get_by_id("user-1", 12345).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_row_and_backing_file() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("plant_1.jpg");
        std::fs::write(&image_path, b"jpeg bytes").unwrap();

        let mut discovery = sample("user-1", "Rosa gallica", 1);
        discovery.local_image_path = image_path.to_string_lossy().to_string();

        let id = store.insert(&discovery).await.unwrap();
        discovery.id = id;

        store.delete(&discovery).await.expect("Delete should succeed");

        assert!(store.get_by_id("user-1", id).await.unwrap().is_none());
        assert!(!image_path.exists(), "Backing image file should be deleted");
    }

    #[tokio::test]
    async fn test_delete_with_missing_file_is_not_an_error() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        let mut discovery = sample("user-1", "Rosa gallica", 1);
        let id = store.insert(&discovery).await.unwrap();
        discovery.id = id;

        // local_image_path points nowhere
        assert!(store.delete(&discovery).await.is_ok());
        assert!(store.get_by_id("user-1", id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_matches_substring_case_insensitively() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        store.insert(&sample("user-1", "Rosa gallica", 1)).await.unwrap();
        store.insert(&sample("user-1", "Quercus robur", 2)).await.unwrap();
        store.insert(&sample("user-1", "Rosa canina", 3)).await.unwrap();

        let results = store.search("user-1", "ROSA").await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|d| d.plant_name.starts_with("Rosa")));

        let results = store.search("user-1", "gall").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].plant_name, "Rosa gallica");
    }

    #[tokio::test]
    async fn test_search_is_user_scoped() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        store.insert(&sample("user-1", "Rosa gallica", 1)).await.unwrap();
        store.insert(&sample("user-2", "Rosa canina", 2)).await.unwrap();

        let results = store.search("user-1", "Rosa").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].user_id, "user-1");
    }

    #[tokio::test]
    async fn test_search_orders_newest_first() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        store.insert(&sample("user-1", "Rosa gallica", 100)).await.unwrap();
        store.insert(&sample("user-1", "Rosa canina", 300)).await.unwrap();
        store.insert(&sample("user-1", "Rosa rugosa", 200)).await.unwrap();

        let results = store.search("user-1", "Rosa").await.unwrap();
        let timestamps: Vec<i64> = results.iter().map(|d| d.timestamp).collect();
        assert_eq!(timestamps, vec![300, 200, 100]);
    }

    #[tokio::test]
    async fn test_search_empty_query_matches_everything() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        store.insert(&sample("user-1", "Rosa gallica", 1)).await.unwrap();
        store.insert(&sample("user-1", "Quercus robur", 2)).await.unwrap();

        let results = store.search("user-1", "").await.unwrap();
        assert_eq!(results.len(), 2, "Empty pattern matches all records");
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        store.insert(&sample("user-1", "Rosa gallica", 1)).await.unwrap();

        assert!(store.search("user-1", "%").await.unwrap().is_empty());
        assert!(store.search("user-1", "_osa").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_is_user_scoped() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        store.insert(&sample("user-1", "Rosa gallica", 1)).await.unwrap();
        store.insert(&sample("user-1", "Quercus robur", 2)).await.unwrap();
        store.insert(&sample("user-2", "Rosa canina", 3)).await.unwrap();

        assert_eq!(store.count("user-1").await.unwrap(), 2);
        assert_eq!(store.count("user-2").await.unwrap(), 1);
        assert_eq!(store.count("user-3").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_observe_reflects_inserts_and_deletes() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        let rx = store.observe("user-1");
        assert!(rx.borrow().is_empty(), "Initial snapshot is empty");

        let mut discovery = sample("user-1", "Rosa gallica", 1);
        let id = store.insert(&discovery).await.unwrap();
        discovery.id = id;

        assert_eq!(rx.borrow().len(), 1, "Insert must be pushed to observers");
        assert_eq!(rx.borrow()[0].plant_name, "Rosa gallica");

        store.delete(&discovery).await.unwrap();
        assert!(rx.borrow().is_empty(), "Delete must be pushed to observers");
    }

    #[tokio::test]
    async fn test_observe_snapshot_includes_existing_records() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        store.insert(&sample("user-1", "Rosa gallica", 1)).await.unwrap();

        let rx = store.observe("user-1");
        assert_eq!(rx.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_observe_is_user_scoped() {
        let store = SqliteDiscoveryStore::new_in_memory().unwrap();

        let rx_one = store.observe("user-1");
        let rx_two = store.observe("user-2");

        store.insert(&sample("user-1", "Rosa gallica", 1)).await.unwrap();

        assert_eq!(rx_one.borrow().len(), 1);
        assert!(rx_two.borrow().is_empty(), "Other users see nothing");
    }

    #[tokio::test]
    async fn test_observe_survives_poisoned_locks() {
        let store = Arc::new(SqliteDiscoveryStore::new_in_memory().unwrap());

        let id = store.insert(&sample("user-1", "Rosa gallica", 1)).await.unwrap();

        // Panic while holding each lock so both are poisoned
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.conn.lock().unwrap();
            panic!("poison conn lock");
        })
        .join();
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.watchers.lock().unwrap();
            panic!("poison watchers lock");
        })
        .join();

        let rx = store.observe("user-1");
        assert_eq!(rx.borrow().len(), 1, "Snapshot is served despite the poison");
        assert_eq!(rx.borrow()[0].id, id);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_assign_unique_ids() {
        let store = Arc::new(SqliteDiscoveryStore::new_in_memory().unwrap());

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(&sample("user-1", "Rosa gallica", i)).await.unwrap()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 16, "Concurrent inserts must not share ids");
        assert_eq!(store.count("user-1").await.unwrap(), 16, "No lost updates");
    }

    #[test]
    fn test_escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("50%_done\\"), "50\\%\\_done\\\\");
        assert_eq!(escape_like("rosa"), "rosa");
    }

    // Property: search returns exactly the user's records whose plant_name
    // contains the query case-insensitively.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_search_matches_manual_filter(
            names in proptest::collection::vec("[a-zA-Z ]{1,12}", 1..8),
            query in "[a-zA-Z]{1,4}",
        ) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let store = SqliteDiscoveryStore::new_in_memory().unwrap();

                for (i, name) in names.iter().enumerate() {
                    store.insert(&sample("user-1", name, i as i64)).await.unwrap();
                }

                let results = store.search("user-1", &query).await.unwrap();

                let expected: Vec<&String> = names
                    .iter()
                    .filter(|n| n.to_lowercase().contains(&query.to_lowercase()))
                    .collect();

                prop_assert_eq!(results.len(), expected.len());
                for result in &results {
                    prop_assert!(
                        result.plant_name.to_lowercase().contains(&query.to_lowercase())
                    );
                }
                Ok(())
            })?
        }
    }
}
