// Candidate selection: pick the first ranked candidate that is both
// nameable and enrichable.

use super::provider::PlantCandidate;
use crate::enrichment::{DescriptionProvider, NO_DESCRIPTION_FOUND};

/// A candidate accepted by the selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedPlant {
    /// Normalized scientific name
    pub plant_name: String,

    /// Encyclopedia description that qualified the candidate
    pub description: String,
}

/// Normalize a scientific name: trim, collapse internal whitespace runs to a
/// single space, replace the typographic apostrophe (U+2019) with the ASCII
/// one. Idempotent.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{2019}', "'")
}

/// Names containing the "spp" marker denote an unresolved species-group
/// guess, not a usable identification.
fn is_species_group(name: &str) -> bool {
    name.to_lowercase().contains("spp")
}

/// Walk the ranked candidate list in service order and return the first
/// candidate whose normalized name is usable and whose enrichment lookup
/// yields a real description. Later candidates are never tried once one
/// succeeds.
///
/// Returns None when every candidate is skipped or unenrichable — the
/// caller treats that as "not a plant".
pub async fn select(
    candidates: &[PlantCandidate],
    describer: &dyn DescriptionProvider,
) -> Option<SelectedPlant> {
    for candidate in candidates {
        let name = normalize_name(&candidate.scientific_name);
        if name.is_empty() || is_species_group(&name) {
            eprintln!(
                "Selector: Skipping unusable candidate \"{}\"",
                candidate.scientific_name
            );
            continue;
        }

        let description = describer.describe(&name, &candidate.common_names).await;
        if description != NO_DESCRIPTION_FOUND {
            eprintln!("Selector: Accepted \"{}\"", name);
            return Some(SelectedPlant {
                plant_name: name,
                description,
            });
        }
        eprintln!("Selector: \"{}\" has no description, trying next candidate", name);
    }

    None
}
