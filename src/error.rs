use std::fmt::{self, Display, Formatter};

/// Failure modes of a discovery pipeline run
#[derive(Debug)]
pub enum DiscoveryError {
    /// No signed-in user; nothing downstream may run
    NotAuthenticated,

    /// Transport-level failure reaching the identification service
    Network(String),

    /// The identification service answered with a non-success HTTP status
    Service(String),

    /// Identification produced no acceptable candidate — an expected,
    /// user-facing outcome, not a system fault
    NotAPlant,

    /// Local file write or database insert failed
    Storage(String),
}

impl Display for DiscoveryError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            DiscoveryError::NotAuthenticated => {
                write!(f, "User not authenticated")
            }
            DiscoveryError::Network(msg) => {
                write!(f, "Could not reach the identification service: {}", msg)
            }
            DiscoveryError::Service(msg) => {
                write!(f, "Identification service error: {}", msg)
            }
            DiscoveryError::NotAPlant => {
                write!(
                    f,
                    "Only plants can be identified by this application. Please submit a photo of a plant."
                )
            }
            DiscoveryError::Storage(msg) => {
                write!(f, "Storage operation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for DiscoveryError {}
