// DiscoveryPipeline - the end-to-end identify-and-save flow:
// authenticate -> stage image -> identify -> select -> persist image -> insert

use image::DynamicImage;
use std::sync::Arc;

use crate::discoveries::{Discovery, DiscoveryStore};
use crate::enrichment::DescriptionProvider;
use crate::error::DiscoveryError;
use crate::files::ImageFileManager;
use crate::identification::{selector, IdentificationProvider};
use crate::session::SessionManager;

/// Orchestrates one discovery run per invocation. Collaborators are passed
/// in explicitly; the pipeline holds no ambient or per-run mutable state, so
/// concurrent runs are independent (the store serializes its own access).
pub struct DiscoveryPipeline {
    session: Arc<SessionManager>,
    identifier: Arc<dyn IdentificationProvider>,
    describer: Arc<dyn DescriptionProvider>,
    store: Arc<dyn DiscoveryStore>,
    files: ImageFileManager,
}

impl DiscoveryPipeline {
    pub fn new(
        session: Arc<SessionManager>,
        identifier: Arc<dyn IdentificationProvider>,
        describer: Arc<dyn DescriptionProvider>,
        store: Arc<dyn DiscoveryStore>,
        files: ImageFileManager,
    ) -> Self {
        Self {
            session,
            identifier,
            describer,
            store,
            files,
        }
    }

    /// Identify the plant in a captured image and persist the discovery.
    ///
    /// Stages run strictly in order; every exit is either the materialized
    /// record or a single DiscoveryError. Nothing is persisted on failure:
    /// the permanent image copy is only written after a candidate is
    /// accepted, and it is removed again if the final insert fails. The
    /// staging file is best-effort and may be left behind on abort paths.
    ///
    /// The caller owns retry policy (re-invoking the whole pipeline).
    pub async fn identify_and_save(
        &self,
        image: &DynamicImage,
    ) -> Result<Discovery, DiscoveryError> {
        // 1. Authenticate: nothing downstream runs without a user
        let user_id = self
            .session
            .current_user()
            .ok_or(DiscoveryError::NotAuthenticated)?;

        // 2. Stage the capture as the JPEG payload for identification
        let staged_path = self
            .files
            .stage_image(image)
            .map_err(DiscoveryError::Storage)?;
        let image_bytes =
            std::fs::read(&staged_path).map_err(|e| {
                DiscoveryError::Storage(format!("Failed to read staged image: {}", e))
            })?;

        // 3. Identify: Network/Service failures surface verbatim
        let candidates = self.identifier.identify(image_bytes).await?;

        // 4. Select the first nameable, enrichable candidate
        let selected = selector::select(&candidates, self.describer.as_ref())
            .await
            .ok_or(DiscoveryError::NotAPlant)?;

        // 5. Only now write the permanent per-user copy
        let permanent_path = self
            .files
            .persist_image(image)
            .map_err(DiscoveryError::Storage)?;

        // 6. Insert the record; no record without its image and vice versa
        let discovery = Discovery {
            id: 0,
            user_id,
            plant_name: selected.plant_name,
            ai_fact: selected.description,
            local_image_path: permanent_path.to_string_lossy().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        let id = match self.store.insert(&discovery).await {
            Ok(id) => id,
            Err(e) => {
                if let Err(cleanup) = ImageFileManager::delete_image(&permanent_path) {
                    eprintln!("Pipeline: Orphaned image cleanup failed: {}", cleanup);
                }
                return Err(DiscoveryError::Storage(e));
            }
        };

        eprintln!(
            "Pipeline: Saved discovery {} (\"{}\") for user {}",
            id, discovery.plant_name, discovery.user_id
        );
        Ok(Discovery { id, ..discovery })
    }
}
