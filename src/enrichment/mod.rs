pub mod provider;
pub mod wikipedia_provider;

pub use provider::{DescriptionProvider, NO_DESCRIPTION_FOUND};
pub use wikipedia_provider::WikipediaProvider;
