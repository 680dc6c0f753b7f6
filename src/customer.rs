// Customer entity and the closed set of funnel stages
//
// Identity (id) never changes; name and email are fixed at seed time.
// Status is the only mutable value and always one of the three stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CrmError;

/// Default initials-avatar generator
pub const DEFAULT_AVATAR_BASE_URL: &str = "https://api.dicebear.com/6.x/initials/svg";

// ============================================================================
// CUSTOMER STATUS
// ============================================================================

/// Sales funnel stage
///
/// Declaration order is funnel order and dropdown order, so `Ord` sorts
/// stages the way every view lists them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CustomerStatus {
    #[serde(rename = "New")]
    New,

    #[serde(rename = "Contract Sent")]
    ContractSent,

    #[serde(rename = "Contract Signed")]
    ContractSigned,
}

impl CustomerStatus {
    /// Every stage, in funnel order
    pub const ALL: [CustomerStatus; 3] = [
        CustomerStatus::New,
        CustomerStatus::ContractSent,
        CustomerStatus::ContractSigned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::New => "New",
            CustomerStatus::ContractSent => "Contract Sent",
            CustomerStatus::ContractSigned => "Contract Signed",
        }
    }

    /// Colour of the stage card bar
    pub fn color_name(&self) -> &'static str {
        match self {
            CustomerStatus::New => "blue",
            CustomerStatus::ContractSent => "yellow",
            CustomerStatus::ContractSigned => "green",
        }
    }

    /// Position in the funnel (0-based)
    pub fn index(&self) -> usize {
        match self {
            CustomerStatus::New => 0,
            CustomerStatus::ContractSent => 1,
            CustomerStatus::ContractSigned => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<CustomerStatus> {
        CustomerStatus::ALL.get(index).copied()
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerStatus {
    type Err = CrmError;

    /// Accepts the display label in any case, with `_` or `-` in place of
    /// the space ("contract_sent", "Contract-Signed").
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().replace(['_', '-'], " ").to_lowercase();

        CustomerStatus::ALL
            .iter()
            .find(|status| status.as_str().to_lowercase() == normalized)
            .copied()
            .ok_or_else(|| CrmError::InvalidStatus(raw.to_string()))
    }
}

// ============================================================================
// CUSTOMER ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Stable identity, unique within a collection
    pub id: u32,

    pub name: String,

    pub email: String,

    pub status: CustomerStatus,
}

impl Customer {
    pub fn new(id: u32, name: impl Into<String>, email: impl Into<String>, status: CustomerStatus) -> Self {
        Customer {
            id,
            name: name.into(),
            email: email.into(),
            status,
        }
    }

    /// Copy of this record with only the status replaced
    pub fn with_status(&self, status: CustomerStatus) -> Customer {
        Customer {
            status,
            ..self.clone()
        }
    }

    /// Avatar fallback text
    ///
    /// Example: "Alice Johnson" → "AJ"
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .collect()
    }

    /// Initials-avatar image URL keyed by display name
    pub fn avatar_url(&self, base_url: &str) -> String {
        format!("{}?seed={}", base_url, urlencoding::encode(&self.name))
    }
}
