use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::customer::{Customer, CustomerStatus};
use crate::error::{CrmError, CrmResult};

/// Built-in mock customers
pub fn seed_customers() -> Vec<Customer> {
    vec![
        Customer::new(1, "Alice Johnson", "alice@example.com", CustomerStatus::New),
        Customer::new(2, "Bob Smith", "bob@example.com", CustomerStatus::ContractSent),
        Customer::new(3, "Charlie Brown", "charlie@example.com", CustomerStatus::ContractSigned),
        Customer::new(4, "David Lee", "david@example.com", CustomerStatus::New),
        Customer::new(5, "Eva Martinez", "eva@example.com", CustomerStatus::ContractSent),
    ]
}

/// One CSV line; status stays raw so unknown labels surface as InvalidStatus
#[derive(Debug, Deserialize)]
struct SeedRow {
    id: u32,
    name: String,
    email: String,
    status: String,
}

/// Load a seed list from CSV with header `id,name,email,status`
pub fn load_seed_csv(path: &Path) -> Result<Vec<Customer>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open seed file: {:?}", path))?;

    let mut customers = Vec::new();
    for (line, result) in reader.deserialize::<SeedRow>().enumerate() {
        let row = result.with_context(|| format!("Failed to parse seed row {}", line + 1))?;
        let status: CustomerStatus = row
            .status
            .parse()
            .with_context(|| format!("Seed row {} (id {})", line + 1, row.id))?;
        customers.push(Customer::new(row.id, row.name, row.email, status));
    }

    validate_unique_ids(&customers)?;
    info!(path = %path.display(), count = customers.len(), "loaded seed customers");

    Ok(customers)
}

/// Seed from `path` when given, else the built-in list
pub fn load_seed(path: Option<&Path>) -> Result<Vec<Customer>> {
    match path {
        Some(path) => load_seed_csv(path),
        None => {
            let customers = seed_customers();
            info!(count = customers.len(), "using built-in seed customers");
            Ok(customers)
        }
    }
}

/// Reject a seed that repeats an identifier
pub fn validate_unique_ids(customers: &[Customer]) -> CrmResult<()> {
    let mut seen = HashSet::new();
    for customer in customers {
        if !seen.insert(customer.id) {
            return Err(CrmError::DuplicateId(customer.id));
        }
    }
    Ok(())
}
