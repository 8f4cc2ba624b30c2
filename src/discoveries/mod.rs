pub mod sqlite_store;
pub mod store;

pub use sqlite_store::SqliteDiscoveryStore;
pub use store::{Discovery, DiscoveryStore};
