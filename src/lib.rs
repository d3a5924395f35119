// Entity Match - Core Library
// Exposes all modules for use in the CLI, API server, and tests

pub mod row;
pub mod extract;
pub mod hostname;
pub mod entity;
pub mod store;
pub mod lookup;
pub mod matcher;
pub mod ingest;

// Re-export commonly used types
pub use row::{FieldValue, Row};
pub use extract::{
    extract_organization_name, extract_signals, extract_website_hostname, ExtractedSignals,
};
pub use hostname::normalize_hostname;
pub use entity::{Entity, EntityType};
pub use store::{
    probe_capabilities, setup_schema, EntityStore, SeedReport, StoreCapabilities,
    UpsertRegistry, UpsertRoute,
};
pub use lookup::{
    find_companies_by_name_or_alias, find_domain_exact, find_domains_by_name,
    find_generic_entities_by_name_or_alias,
};
pub use matcher::{
    summarize, BatchSummary, BestMatch, CandidateSet, MatchEngine, MatchResult,
    DOMAIN_CANDIDATE_LIMIT, ORGANIZATION_CANDIDATE_LIMIT,
};
pub use ingest::{load_rows, parse_rows};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
