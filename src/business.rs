//! Business profiles
//!
//! The issuing business is a read dependency of the invoice flow: it decides
//! whether an owner may invoice at all, supplies the default currency, and
//! brands the document and email. Profile CRUD lives elsewhere; this module
//! only looks profiles up.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Profile of an invoice issuer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    /// Business id
    pub id: Uuid,
    /// Owning user
    pub owner_id: String,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    /// Currency for invoices that do not name one
    #[serde(default)]
    pub default_currency: Option<String>,
}

impl Business {
    /// Fields an owner must fill in before invoicing
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.email.trim().is_empty() {
            missing.push("email");
        }
        missing
    }

    /// Sender block printed on documents
    pub fn sender_identity(&self) -> SenderIdentity {
        let locality = match (self.city.as_deref(), self.state.as_deref()) {
            (Some(city), Some(state)) => format!("{city}, {state}"),
            (Some(city), None) => city.to_string(),
            (None, Some(state)) => state.to_string(),
            (None, None) => String::new(),
        };
        let region = format!(
            "{} {}",
            self.country.as_deref().unwrap_or("India"),
            self.postal_code.as_deref().unwrap_or("")
        )
        .trim()
        .to_string();

        SenderIdentity {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            tax_id: self.tax_id.clone(),
            address_lines: [self.address.clone().unwrap_or_default(), locality, region]
                .into_iter()
                .filter(|line| !line.is_empty())
                .collect(),
        }
    }
}

/// Sender identity shown on a rendered invoice
#[derive(Debug, Clone, PartialEq)]
pub struct SenderIdentity {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
    pub address_lines: Vec<String>,
}

/// Reject owners whose profile is absent or incomplete
pub fn require_complete(business: Option<Business>) -> Result<Business> {
    let business = business.ok_or_else(|| Error::SetupRequired {
        message: "Business setup required. Please complete your business profile first."
            .to_string(),
        missing: Vec::new(),
    })?;

    let missing = business.missing_fields();
    if !missing.is_empty() {
        return Err(Error::SetupRequired {
            message: "Incomplete business profile. Please complete all required fields."
                .to_string(),
            missing,
        });
    }

    Ok(business)
}

/// Lookup of business profiles by owner
#[async_trait]
pub trait BusinessDirectory: Send + Sync + 'static {
    /// Profile owned by `owner_id`, if any
    async fn find_by_owner(&self, owner_id: &str) -> Result<Option<Business>>;
}

/// Directory held in memory, keyed by owner
#[derive(Debug, Default)]
pub struct InMemoryBusinessDirectory {
    by_owner: RwLock<HashMap<String, Business>>,
}

impl InMemoryBusinessDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the profile for its owner
    pub fn upsert(&self, business: Business) {
        self.by_owner
            .write()
            .insert(business.owner_id.clone(), business);
    }

    /// Build a directory from a JSON array of profiles
    pub fn from_json(raw: &str) -> std::result::Result<Self, serde_json::Error> {
        let profiles: Vec<Business> = serde_json::from_str(raw)?;
        let directory = Self::new();
        for profile in profiles {
            directory.upsert(profile);
        }
        Ok(directory)
    }

    /// Load profiles from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let directory = Self::from_json(&raw)?;
        tracing::info!(
            path = %path.display(),
            profiles = directory.len(),
            "Loaded business profiles"
        );
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.by_owner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_owner.read().is_empty()
    }
}

#[async_trait]
impl BusinessDirectory for InMemoryBusinessDirectory {
    async fn find_by_owner(&self, owner_id: &str) -> Result<Option<Business>> {
        Ok(self.by_owner.read().get(owner_id).cloned())
    }
}
