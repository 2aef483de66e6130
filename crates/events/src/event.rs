use serde::Serialize;
use serde::de::DeserializeOwned;

/// A cross-module integration event.
///
/// Integration events are:
/// - **immutable** (treat them as facts)
/// - **self-contained** (carry enough data for the receiving module to build
///   a local command without calling back)
/// - identified by a **stable string discriminator**, never a language type
///   name, so the wire format survives refactors.
pub trait IntegrationEvent:
    Serialize + DeserializeOwned + Clone + core::fmt::Debug + Send + Sync + 'static
{
    /// Stable event name (e.g. "basket.checked_out"). Doubles as the logical
    /// bus channel: consumers subscribe by this name.
    const EVENT_TYPE: &'static str;
}
