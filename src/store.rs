// Customer Store - single owner of the current collection snapshot
//
// Snapshots are immutable. A mutation builds a new collection that shares
// every untouched record (same Arc) with the previous one, then swaps it in.
// Readers holding an older snapshot keep seeing exactly what they cloned.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::customer::{Customer, CustomerStatus};
use crate::error::{CrmError, CrmResult};
use crate::seed::validate_unique_ids;

// ============================================================================
// CUSTOMER COLLECTION
// ============================================================================

/// Ordered, id-unique sequence of customers
#[derive(Debug, Clone, Default)]
pub struct CustomerCollection {
    customers: Arc<Vec<Arc<Customer>>>,
}

impl CustomerCollection {
    /// Build a collection, rejecting repeated identifiers
    pub fn new(customers: Vec<Customer>) -> CrmResult<Self> {
        validate_unique_ids(&customers)?;
        Ok(CustomerCollection {
            customers: Arc::new(customers.into_iter().map(Arc::new).collect()),
        })
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Customer>> {
        self.customers.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Customer>> {
        self.customers.get(index)
    }

    pub fn find(&self, id: u32) -> Option<&Arc<Customer>> {
        self.customers.iter().find(|c| c.id == id)
    }

    pub fn position(&self, id: u32) -> Option<usize> {
        self.customers.iter().position(|c| c.id == id)
    }

    /// True when both handles point at the same snapshot
    pub fn ptr_eq(&self, other: &CustomerCollection) -> bool {
        Arc::ptr_eq(&self.customers, &other.customers)
    }

    /// New collection with one record's status replaced
    ///
    /// Untouched records are shared with `self`. Fails with `NotFound` when
    /// no record carries `id`.
    pub fn with_status(&self, id: u32, status: CustomerStatus) -> CrmResult<CustomerCollection> {
        let index = self.position(id).ok_or(CrmError::NotFound(id))?;

        let customers = self
            .customers
            .iter()
            .enumerate()
            .map(|(i, customer)| {
                if i == index {
                    Arc::new(customer.with_status(status))
                } else {
                    Arc::clone(customer)
                }
            })
            .collect();

        Ok(CustomerCollection {
            customers: Arc::new(customers),
        })
    }

    /// Status mutator with no-op-on-miss semantics
    ///
    /// Returns the same snapshot when `id` is absent or already has `status`.
    pub fn set_status(&self, id: u32, status: CustomerStatus) -> CustomerCollection {
        match self.find(id) {
            Some(customer) if customer.status != status => {
                self.with_status(id, status).unwrap_or_else(|_| self.clone())
            }
            _ => self.clone(),
        }
    }
}

impl PartialEq for CustomerCollection {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.customers == other.customers
    }
}

impl Eq for CustomerCollection {}

impl Serialize for CustomerCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.customers.iter().map(|c| c.as_ref()))
    }
}

// ============================================================================
// STATUS CHANGE LOG
// ============================================================================

/// One applied status change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub customer_id: u32,
    pub customer_name: String,
    pub from: CustomerStatus,
    pub to: CustomerStatus,
    pub at: DateTime<Utc>,
}

// ============================================================================
// CUSTOMER STORE
// ============================================================================

/// Owns the current snapshot and the single mutation entry point
#[derive(Debug, Default)]
pub struct CustomerStore {
    current: CustomerCollection,
    history: Vec<StatusChange>,
}

impl CustomerStore {
    pub fn new(collection: CustomerCollection) -> Self {
        CustomerStore {
            current: collection,
            history: Vec::new(),
        }
    }

    pub fn from_customers(customers: Vec<Customer>) -> CrmResult<Self> {
        Ok(Self::new(CustomerCollection::new(customers)?))
    }

    /// Current snapshot (cheap Arc clone)
    pub fn snapshot(&self) -> CustomerCollection {
        self.current.clone()
    }

    /// Applied status changes, oldest first
    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    pub fn last_change(&self) -> Option<&StatusChange> {
        self.history.last()
    }

    /// Change one customer's status, reporting a miss as `NotFound`
    ///
    /// Setting the status a record already has leaves the snapshot and the
    /// history untouched.
    pub fn try_set_status(&mut self, id: u32, status: CustomerStatus) -> CrmResult<Arc<Customer>> {
        let existing = self.current.find(id).cloned().ok_or(CrmError::NotFound(id))?;

        if existing.status == status {
            debug!(customer_id = id, status = %status, "status unchanged");
            return Ok(existing);
        }

        let next = self.current.with_status(id, status)?;
        let updated = next.find(id).cloned().ok_or(CrmError::NotFound(id))?;

        self.history.push(StatusChange {
            customer_id: id,
            customer_name: existing.name.clone(),
            from: existing.status,
            to: status,
            at: Utc::now(),
        });
        self.current = next;

        info!(
            customer_id = id,
            from = %existing.status,
            to = %status,
            "customer status changed"
        );

        Ok(updated)
    }

    /// Change one customer's status; unknown ids are logged and ignored
    ///
    /// Returns true when the snapshot was replaced.
    pub fn set_status(&mut self, id: u32, status: CustomerStatus) -> bool {
        let before = self.current.clone();
        match self.try_set_status(id, status) {
            Ok(_) => !self.current.ptr_eq(&before),
            Err(err) => {
                warn!(customer_id = id, status = %status, error = %err, "ignoring status change");
                false
            }
        }
    }

    /// Free-text variant: an unknown label is rejected and nothing changes
    pub fn set_status_str(&mut self, id: u32, raw: &str) -> CrmResult<bool> {
        let status: CustomerStatus = raw.parse().map_err(|err| {
            warn!(customer_id = id, raw, "rejecting invalid status");
            err
        })?;
        Ok(self.set_status(id, status))
    }
}
