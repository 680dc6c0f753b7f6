// Persistence seam for status changes
//
// A real deployment would upsert the customer's status remotely after each
// local mutation. Only the local half exists here; `LocalOnlyBackend` stands
// in for the remote call and persists nothing.

use tracing::debug;

use crate::config::BackendKind;
use crate::customer::{Customer, CustomerStatus};
use crate::error::{CrmError, CrmResult};

/// Idempotent upsert of one customer's status, by identifier
pub trait CustomerBackend {
    fn update_customer_status(&self, customer: &Customer, new_status: CustomerStatus) -> CrmResult<Customer>;

    fn name(&self) -> &str;
}

/// Echoes the locally updated record; nothing leaves the process
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalOnlyBackend;

impl CustomerBackend for LocalOnlyBackend {
    fn update_customer_status(&self, customer: &Customer, new_status: CustomerStatus) -> CrmResult<Customer> {
        debug!(customer_id = customer.id, status = %new_status, "local-only backend, not persisted");
        Ok(customer.with_status(new_status))
    }

    fn name(&self) -> &str {
        "local-only"
    }
}

/// Backend that rejects every update (offline / maintenance mode)
#[derive(Debug, Clone)]
pub struct UnavailableBackend {
    pub reason: String,
}

impl CustomerBackend for UnavailableBackend {
    fn update_customer_status(&self, customer: &Customer, _new_status: CustomerStatus) -> CrmResult<Customer> {
        Err(CrmError::Backend(format!(
            "could not save customer {}: {}",
            customer.id, self.reason
        )))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// Backend selected by the `backend` setting
pub fn backend_for(kind: BackendKind) -> Box<dyn CustomerBackend + Send + Sync> {
    match kind {
        BackendKind::Local => Box::new(LocalOnlyBackend),
        BackendKind::Offline => Box::new(UnavailableBackend {
            reason: "backend is offline".to_string(),
        }),
    }
}
