// Entity Model - named records in the persistent store
//
// Entities are owned by the store and strictly read-only for the matching
// core. The type tag doubles as the wire value in best-match payloads.

use serde::{Deserialize, Serialize};

// ============================================================================
// ENTITY TYPE
// ============================================================================

/// Which collection an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    Username,
    Company,
    Location,
    InternetDomainName,
    GenericEntity,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Username => "Username",
            EntityType::Company => "Company",
            EntityType::Location => "Location",
            EntityType::InternetDomainName => "InternetDomainName",
            EntityType::GenericEntity => "GenericEntity",
        }
    }

    /// Backing table for this collection.
    pub fn table(&self) -> &'static str {
        match self {
            EntityType::Username => "usernames",
            EntityType::Company => "companies",
            EntityType::Location => "locations",
            EntityType::InternetDomainName => "internet_domain_names",
            EntityType::GenericEntity => "generic_entities",
        }
    }

    /// All seeded collections.
    pub fn all() -> &'static [EntityType] {
        &[
            EntityType::Username,
            EntityType::Company,
            EntityType::Location,
            EntityType::InternetDomainName,
            EntityType::GenericEntity,
        ]
    }
}

// ============================================================================
// ENTITY
// ============================================================================

/// A named record from one of the entity collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Stable unique id, assigned at seed time.
    pub id: String,

    pub name: String,

    pub entity_type: EntityType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_type: Option<String>,

    /// Long-form name, companies only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longname: Option<String>,

    /// Alternate names widening substring matching.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub aliases: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub curated: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits: Option<i64>,

    /// Unmodeled seed fields, kept verbatim for generic entities.
    #[serde(skip_serializing_if = "serde_json::Value::is_null", default)]
    pub attributes: serde_json::Value,
}

impl Entity {
    /// Minimal entity with everything optional left empty.
    pub fn new(id: String, name: String, entity_type: EntityType) -> Self {
        Entity {
            id,
            name,
            entity_type,
            meta_type: None,
            longname: None,
            aliases: Vec::new(),
            curated: None,
            hits: None,
            attributes: serde_json::Value::Null,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
