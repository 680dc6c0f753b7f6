// Initech CRM - Core Library
// Customer store, status mutation and funnel grouping shared by the
// terminal UI, the web server and the tests

pub mod backend;
pub mod config;
pub mod customer;
pub mod error;
pub mod funnel;
pub mod logging;
pub mod report;
pub mod seed;
pub mod store;

#[cfg(test)]
pub(crate) mod strategies;

// Re-export commonly used types
pub use backend::{backend_for, CustomerBackend, LocalOnlyBackend, UnavailableBackend};
pub use config::{load_settings, BackendKind, Settings, StartPage, DEFAULT_CONFIG_FILE};
pub use customer::{Customer, CustomerStatus, DEFAULT_AVATAR_BASE_URL};
pub use error::{CrmError, CrmResult};
pub use funnel::FunnelGrouping;
pub use logging::{init_logging, LogSink};
pub use report::{format_funnel, format_table, FunnelReport, TableReport};
pub use seed::{load_seed, load_seed_csv, seed_customers, validate_unique_ids};
pub use store::{CustomerCollection, CustomerStore, StatusChange};

/// Build the store from the configured seed (CSV file or built-in list)
pub fn build_store(settings: &Settings) -> anyhow::Result<CustomerStore> {
    let customers = load_seed(settings.seed_file.as_deref())?;
    Ok(CustomerStore::from_customers(customers)?)
}
