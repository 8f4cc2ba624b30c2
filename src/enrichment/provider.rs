use async_trait::async_trait;

/// Sentinel returned when every name variant and locale came back empty.
///
/// Callers compare against this value instead of handling an error: a failed
/// or missing lookup and a genuinely undocumented species are deliberately
/// conflated (the selector rejects both the same way).
pub const NO_DESCRIPTION_FOUND: &str = "No wikipedia description found.";

/// Trait-based abstraction for encyclopedia description lookups.
///
/// # Thread Safety
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait DescriptionProvider: Send + Sync {
    /// Returns the name of this provider (e.g., "wikipedia")
    fn name(&self) -> &str;

    /// Looks up a human-readable description for a species.
    ///
    /// Never fails the caller: internal network or parse errors degrade to
    /// the NO_DESCRIPTION_FOUND sentinel.
    async fn describe(&self, scientific_name: &str, common_names: &[String]) -> String;
}
