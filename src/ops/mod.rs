mod bookings;
pub(crate) mod conflict;
mod customers;
mod error;
mod rooms;

pub use error::{OpsError, Resource};

use std::sync::Arc;

use crate::store::EntityStore;

/// The front desk: thin orchestration over the entity store. Fetches the
/// entities an operation references, runs the pure validation, and persists.
/// All I/O goes through the store seam; everything else is deterministic.
pub struct Desk {
    store: Arc<dyn EntityStore>,
}

impl Desk {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Readiness hook for the health endpoint.
    pub async fn ping(&self) -> Result<(), OpsError> {
        self.store.ping().await.map_err(OpsError::from)
    }
}
