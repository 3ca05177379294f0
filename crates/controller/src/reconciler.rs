//! The reconciler trait driven by the dispatcher

use crate::error::Result;
use crate::types::Action;
use objstore::ObjectKey;

/// Converges one kind of object
///
/// Implementations must be safe to call concurrently for different
/// identities and repeatedly for the same one.
pub trait Reconciler: Send + Sync {
    /// Kind of object this reconciler owns, e.g. `"Execution"`
    fn kind(&self) -> &'static str;

    /// Identities currently present in the store
    fn keys(&self) -> Result<Vec<ObjectKey>>;

    /// Bring one object closer to its desired state
    fn reconcile(&self, key: &ObjectKey) -> Result<Action>;
}
