// Module declarations
pub mod discoveries;
pub mod enrichment;
pub mod error;
pub mod files;
pub mod identification;
pub mod logging;
pub mod pipeline;
pub mod session;

pub use discoveries::{Discovery, DiscoveryStore, SqliteDiscoveryStore};
pub use enrichment::{DescriptionProvider, WikipediaProvider, NO_DESCRIPTION_FOUND};
pub use error::DiscoveryError;
pub use files::ImageFileManager;
pub use identification::{IdentificationProvider, PlantCandidate, PlantNetProvider};
pub use pipeline::DiscoveryPipeline;
pub use session::SessionManager;
