//! Opaque event keys.

use std::any::Any;
use std::fmt::Debug;

use super::Result;

/// Position in a build's event stream, as handed out by an `EventStore`.
///
/// The host treats keys as opaque: it compares them, persists them with
/// `marshal`, and hands the bytes back to the same backend's
/// `EventStore::unmarshal_key`. Keys from different backends never compare;
/// doing so is an error rather than a silent `false`.
pub trait EventKey: Debug + Send + Sync {
    /// Whether this key is strictly after `other`. `None` is the position
    /// before the first event, so every key is greater than it.
    fn greater_than(&self, other: Option<&dyn EventKey>) -> Result<bool>;

    /// Serialize for persistence by the host.
    fn marshal(&self) -> Result<Vec<u8>>;

    /// Name of the backend that produced this key.
    fn backend(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}
