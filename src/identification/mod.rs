pub mod plantnet_provider;
pub mod provider;
pub mod selector;

pub use plantnet_provider::PlantNetProvider;
pub use provider::{IdentificationProvider, PlantCandidate};
pub use selector::{normalize_name, select, SelectedPlant};
