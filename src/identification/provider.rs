use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DiscoveryError;

/// One ranked species guess returned by the identification service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantCandidate {
    /// Scientific name without author suffix (e.g., "Rosa gallica")
    pub scientific_name: String,

    /// Vernacular aliases in no guaranteed locale (e.g., "French rose")
    pub common_names: Vec<String>,
}

/// Trait-based abstraction for plant identification services.
///
/// This trait enables provider swapping (Pl@ntNet, a different recognition
/// API, test stubs) without changing the pipeline orchestration.
///
/// # Thread Safety
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait IdentificationProvider: Send + Sync {
    /// Returns the name of this provider (e.g., "plantnet")
    fn name(&self) -> &str;

    /// Identifies the plant in the given JPEG bytes.
    ///
    /// Returns the ranked candidate list, best guess first, exactly as the
    /// service ordered it. An empty list means "no match" and is not an
    /// error.
    ///
    /// # Errors
    /// `Network` on transport failure, `Service` on a non-success HTTP
    /// status from the recognition endpoint.
    async fn identify(&self, image_bytes: Vec<u8>) -> Result<Vec<PlantCandidate>, DiscoveryError>;
}
