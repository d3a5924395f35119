// Entity Store - SQLite persistence for the seeded entity collections
//
// Five collections: usernames, companies, locations, internet domain names,
// and generic entities. Alias support (JSON array columns and relation
// tables) is deployment-dependent: capabilities are probed once per
// connection and cached, and lookups consult the flags instead of issuing
// speculative queries. The matching core only ever reads; seeding is the
// single writer and runs outside the matching path.

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::entity::{Entity, EntityType};

/// JSON-array alias columns probed on the companies table.
pub const COMPANY_ALIAS_COLUMNS: &[&str] = &["aliases", "alt_names", "aka"];

/// JSON-array alias columns probed on the generic_entities table.
pub const GENERIC_ENTITY_ALIAS_COLUMNS: &[&str] = &["aliases", "alt_names", "aka", "aka_names"];

// ============================================================================
// CAPABILITIES
// ============================================================================

/// What alias support this deployment's schema actually carries.
/// Probed once per connection; lookups degrade to baseline queries when a
/// capability is absent.
#[derive(Debug, Clone, Default)]
pub struct StoreCapabilities {
    /// company_aliases relation table exists
    pub company_alias_relation: bool,

    /// generic_entity_aliases relation table exists
    pub generic_entity_alias_relation: bool,

    /// JSON-array alias columns present on companies
    pub company_alias_columns: Vec<String>,

    /// JSON-array alias columns present on generic_entities
    pub generic_entity_alias_columns: Vec<String>,
}

impl StoreCapabilities {
    pub fn has_any_alias_support(&self) -> bool {
        self.company_alias_relation
            || self.generic_entity_alias_relation
            || !self.company_alias_columns.is_empty()
            || !self.generic_entity_alias_columns.is_empty()
    }
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(columns)
}

fn present_columns(conn: &Connection, table: &str, candidates: &[&str]) -> Result<Vec<String>> {
    if !table_exists(conn, table)? {
        return Ok(Vec::new());
    }
    let columns = table_columns(conn, table)?;
    Ok(candidates
        .iter()
        .filter(|candidate| columns.iter().any(|c| c == *candidate))
        .map(|candidate| candidate.to_string())
        .collect())
}

/// Introspect the schema once and record which alias features are present.
pub fn probe_capabilities(conn: &Connection) -> Result<StoreCapabilities> {
    Ok(StoreCapabilities {
        company_alias_relation: table_exists(conn, "company_aliases")?,
        generic_entity_alias_relation: table_exists(conn, "generic_entity_aliases")?,
        company_alias_columns: present_columns(conn, "companies", COMPANY_ALIAS_COLUMNS)?,
        generic_entity_alias_columns: present_columns(
            conn,
            "generic_entities",
            GENERIC_ENTITY_ALIAS_COLUMNS,
        )?,
    })
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Create the full schema: the five entity tables with alias array columns
/// plus the alias relation tables. Deployments may run a reduced schema
/// without the alias pieces; the store opens those too.
pub fn setup_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS usernames (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            meta_type TEXT,
            curated INTEGER,
            hits INTEGER,
            domain TEXT,
            display_name TEXT,
            aliases TEXT,
            created TEXT,
            modified TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS companies (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            meta_type TEXT,
            longname TEXT,
            curated INTEGER,
            hits INTEGER,
            domicile TEXT,
            aliases TEXT,
            alt_names TEXT,
            aka TEXT,
            created TEXT,
            modified TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS locations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            meta_type TEXT,
            curated INTEGER,
            hits INTEGER,
            latitude REAL,
            longitude REAL,
            aliases TEXT,
            created TEXT,
            modified TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS internet_domain_names (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            meta_type TEXT,
            curated INTEGER,
            hits INTEGER,
            level INTEGER,
            created TEXT,
            modified TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS generic_entities (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            meta_type TEXT,
            curated INTEGER,
            hits INTEGER,
            aliases TEXT,
            alt_names TEXT,
            aka TEXT,
            aka_names TEXT,
            attributes TEXT,
            created TEXT,
            modified TEXT
        )",
        [],
    )?;

    // Relation-style aliases (one row per alternate name)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS company_aliases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id TEXT NOT NULL,
            name TEXT NOT NULL,
            UNIQUE(company_id, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS generic_entity_aliases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_id TEXT NOT NULL,
            name TEXT NOT NULL,
            UNIQUE(entity_id, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_companies_name ON companies(name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_generic_entities_name ON generic_entities(name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_domain_names_name ON internet_domain_names(name)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ENTITY STORE
// ============================================================================

pub struct EntityStore {
    conn: Arc<Mutex<Connection>>,
    capabilities: StoreCapabilities,
}

impl EntityStore {
    /// Open a file-backed store with WAL enabled and probe capabilities.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open entity database at {:?}", path))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let capabilities = probe_capabilities(&conn)?;
        Ok(EntityStore {
            conn: Arc::new(Mutex::new(conn)),
            capabilities,
        })
    }

    /// Create the full schema and refresh the cached capabilities.
    pub fn setup(&mut self) -> Result<()> {
        {
            let conn = self.lock();
            setup_schema(&conn)?;
        }
        let capabilities = probe_capabilities(&self.lock())?;
        self.capabilities = capabilities;
        Ok(())
    }

    pub fn capabilities(&self) -> &StoreCapabilities {
        &self.capabilities
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    /// Row count per collection. Missing tables count as zero so a reduced
    /// schema still reports.
    pub fn entity_counts(&self) -> Result<Vec<(&'static str, i64)>> {
        let conn = self.lock();
        let mut counts = Vec::new();
        for entity_type in EntityType::all() {
            let count = if table_exists(&conn, entity_type.table())? {
                conn.query_row(
                    &format!("SELECT COUNT(*) FROM {}", entity_type.table()),
                    [],
                    |row| row.get(0),
                )?
            } else {
                0
            };
            counts.push((entity_type.table(), count));
        }
        Ok(counts)
    }

    /// First `take` records of a collection, for smoke-testing a deployment.
    pub fn sample(&self, entity_type: EntityType, take: usize) -> Result<Vec<Entity>> {
        let conn = self.lock();
        if !table_exists(&conn, entity_type.table())? {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, name, meta_type, curated, hits FROM {} ORDER BY rowid LIMIT ?1",
            entity_type.table()
        );
        let mut stmt = conn.prepare(&sql)?;
        let entities = stmt
            .query_map([take as i64], |row| {
                let mut entity =
                    Entity::new(row.get(0)?, row.get(1)?, entity_type);
                entity.meta_type = row.get(2)?;
                entity.curated = row.get::<_, Option<i64>>(3)?.map(|v| v != 0);
                entity.hits = row.get(4)?;
                Ok(entity)
            })?
            .collect::<rusqlite::Result<Vec<Entity>>>()?;
        Ok(entities)
    }

    /// Seed the store from an entities JSON file (object keyed by id, or a
    /// plain array). Records route through the upsert registry; a record
    /// that fails is logged and skipped, never aborts the seed.
    pub fn seed_from_json(&self, path: &Path) -> Result<SeedReport> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {:?}", path))?;
        if raw.trim().is_empty() {
            tracing::warn!(?path, "seed file is empty, nothing to do");
            return Ok(SeedReport::default());
        }

        let parsed: Value =
            serde_json::from_str(&raw).context("invalid JSON in seed file")?;
        let records: Vec<&Value> = match &parsed {
            Value::Object(map) => map.values().collect(),
            Value::Array(items) => items.iter().collect(),
            _ => bail!("seed file must be a JSON object or array of entities"),
        };

        let registry = UpsertRegistry::with_defaults();
        let conn = self.lock();
        let mut report = SeedReport::default();
        for record in records {
            match registry.upsert(&conn, record) {
                Ok(_) => report.seeded += 1,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping entity record");
                    report.skipped += 1;
                }
            }
        }
        Ok(report)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub seeded: usize,
    pub skipped: usize,
}

// ============================================================================
// UPSERT REGISTRY
// ============================================================================

pub type UpsertFn = fn(&Connection, &Value) -> Result<()>;

/// One seeding route: which type tags it claims and how records land in
/// its table.
pub struct UpsertRoute {
    pub table: &'static str,
    pub tags: &'static [&'static str],
    pub upsert: UpsertFn,
}

/// Dispatch table from entity type tag to upsert target. New entity kinds
/// register a route instead of growing a match statement; unmatched tags
/// fall through to the generic-entities route.
pub struct UpsertRegistry {
    routes: Vec<UpsertRoute>,
    fallback: UpsertRoute,
}

impl UpsertRegistry {
    pub fn with_defaults() -> Self {
        let mut registry = UpsertRegistry {
            routes: Vec::new(),
            fallback: UpsertRoute {
                table: "generic_entities",
                tags: &[],
                upsert: upsert_generic_entity,
            },
        };
        registry.register(UpsertRoute {
            table: "usernames",
            tags: &["Username"],
            upsert: upsert_username,
        });
        registry.register(UpsertRoute {
            table: "companies",
            tags: &["Company"],
            upsert: upsert_company,
        });
        registry.register(UpsertRoute {
            table: "locations",
            tags: &["City", "Region", "Facility", "Airport", "NaturalFeature"],
            upsert: upsert_location,
        });
        registry.register(UpsertRoute {
            table: "internet_domain_names",
            tags: &["InternetDomainName"],
            upsert: upsert_domain_name,
        });
        registry
    }

    pub fn register(&mut self, route: UpsertRoute) {
        self.routes.push(route);
    }

    pub fn route_for(&self, tag: &str) -> &UpsertRoute {
        self.routes
            .iter()
            .find(|route| route.tags.contains(&tag))
            .unwrap_or(&self.fallback)
    }

    /// Route one seed record to its table. Returns the table it landed in.
    pub fn upsert(&self, conn: &Connection, record: &Value) -> Result<&'static str> {
        let tag = record.get("type").and_then(Value::as_str).unwrap_or("");
        let route = self.route_for(tag);
        (route.upsert)(conn, record)?;
        Ok(route.table)
    }
}

// ============================================================================
// SEED RECORD FIELD HELPERS
// ============================================================================

fn record_id(record: &Value) -> String {
    record
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn require_str(record: &Value, key: &str) -> Result<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .with_context(|| format!("entity record missing required field '{}'", key))
}

fn opt_str(record: &Value, key: &str) -> Option<String> {
    record.get(key).and_then(Value::as_str).map(str::to_string)
}

fn opt_i64(record: &Value, key: &str) -> Option<i64> {
    record.get(key).and_then(Value::as_i64)
}

/// The original seed data marks curation as the integer 1; accept a plain
/// bool as well.
fn opt_curated(record: &Value) -> Option<bool> {
    match record.get("curated") {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::Number(n)) => Some(n.as_i64() == Some(1)),
        _ => None,
    }
}

/// Collect alternate names from whichever alias-style fields the record
/// carries, deduplicated in order.
fn record_aliases(record: &Value, keys: &[&str]) -> Vec<String> {
    let mut aliases = Vec::new();
    for key in keys {
        if let Some(values) = record.get(*key).and_then(Value::as_array) {
            for value in values {
                if let Some(s) = value.as_str() {
                    if !aliases.iter().any(|a| a == s) {
                        aliases.push(s.to_string());
                    }
                }
            }
        }
    }
    aliases
}

fn aliases_json(aliases: &[String]) -> Result<Option<String>> {
    if aliases.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(aliases)?))
    }
}

// ============================================================================
// UPSERT FUNCTIONS (insert-or-ignore, keyed by id)
// ============================================================================

fn upsert_username(conn: &Connection, record: &Value) -> Result<()> {
    let name = require_str(record, "name")?;
    let aliases = record_aliases(record, &["alias", "aliases", "common_names", "commonNames"]);
    conn.execute(
        "INSERT OR IGNORE INTO usernames
            (id, name, type, meta_type, curated, hits, domain, display_name, aliases, created, modified)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            record_id(record),
            name,
            require_str(record, "type")?,
            opt_str(record, "meta_type"),
            opt_curated(record),
            opt_i64(record, "hits"),
            opt_str(record, "domain"),
            opt_str(record, "display_name").or_else(|| opt_str(record, "displayName")),
            aliases_json(&aliases)?,
            opt_str(record, "created"),
            opt_str(record, "modified"),
        ],
    )?;
    Ok(())
}

fn upsert_company(conn: &Connection, record: &Value) -> Result<()> {
    let id = record_id(record);
    let name = require_str(record, "name")?;
    let aliases = record_aliases(record, &["alias", "aliases"]);
    conn.execute(
        "INSERT OR IGNORE INTO companies
            (id, name, type, meta_type, longname, curated, hits, domicile, aliases, created, modified)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            id,
            name,
            require_str(record, "type")?,
            opt_str(record, "meta_type"),
            opt_str(record, "longname"),
            opt_curated(record),
            opt_i64(record, "hits"),
            opt_str(record, "domicile"),
            aliases_json(&aliases)?,
            opt_str(record, "created"),
            opt_str(record, "modified"),
        ],
    )?;

    // Mirror aliases into the relation table so both lookup tiers see them
    for alias in &aliases {
        conn.execute(
            "INSERT OR IGNORE INTO company_aliases (company_id, name) VALUES (?1, ?2)",
            params![id, alias],
        )?;
    }
    Ok(())
}

fn upsert_location(conn: &Connection, record: &Value) -> Result<()> {
    let name = require_str(record, "name")?;
    let aliases = record_aliases(record, &["alias", "aliases"]);
    let latitude = record
        .pointer("/pos/latitude")
        .and_then(Value::as_f64);
    let longitude = record
        .pointer("/pos/longitude")
        .and_then(Value::as_f64);
    conn.execute(
        "INSERT OR IGNORE INTO locations
            (id, name, type, meta_type, curated, hits, latitude, longitude, aliases, created, modified)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            record_id(record),
            name,
            require_str(record, "type")?,
            opt_str(record, "meta_type"),
            opt_curated(record),
            opt_i64(record, "hits"),
            latitude,
            longitude,
            aliases_json(&aliases)?,
            opt_str(record, "created"),
            opt_str(record, "modified"),
        ],
    )?;
    Ok(())
}

fn upsert_domain_name(conn: &Connection, record: &Value) -> Result<()> {
    let name = require_str(record, "name")?;
    conn.execute(
        "INSERT OR IGNORE INTO internet_domain_names
            (id, name, type, meta_type, curated, hits, level, created, modified)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record_id(record),
            name,
            require_str(record, "type")?,
            opt_str(record, "meta_type"),
            opt_curated(record),
            opt_i64(record, "hits"),
            opt_i64(record, "level"),
            opt_str(record, "created"),
            opt_str(record, "modified"),
        ],
    )?;
    Ok(())
}

/// Known fields land in columns; everything else is bagged into the
/// attributes JSON, matching the original seed behavior.
const GENERIC_KNOWN_FIELDS: &[&str] = &[
    "id", "name", "type", "meta_type", "curated", "hits", "created", "modified", "alias",
    "aliases", "alt_names", "aka", "aka_names",
];

fn upsert_generic_entity(conn: &Connection, record: &Value) -> Result<()> {
    let id = record_id(record);
    let name = require_str(record, "name")?;
    let aliases = record_aliases(record, &["alias", "aliases"]);
    let alt_names = record_aliases(record, &["alt_names", "altNames"]);
    let aka = record_aliases(record, &["aka"]);
    let aka_names = record_aliases(record, &["aka_names", "akaNames"]);

    let attributes = match record {
        Value::Object(map) => {
            let rest: serde_json::Map<String, Value> = map
                .iter()
                .filter(|(key, _)| !GENERIC_KNOWN_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            if rest.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&Value::Object(rest))?)
            }
        }
        _ => None,
    };

    conn.execute(
        "INSERT OR IGNORE INTO generic_entities
            (id, name, type, meta_type, curated, hits, aliases, alt_names, aka, aka_names, attributes, created, modified)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            id,
            name,
            opt_str(record, "type").unwrap_or_else(|| "Unknown".to_string()),
            opt_str(record, "meta_type"),
            opt_curated(record),
            opt_i64(record, "hits"),
            aliases_json(&aliases)?,
            aliases_json(&alt_names)?,
            aliases_json(&aka)?,
            aliases_json(&aka_names)?,
            attributes,
            opt_str(record, "created"),
            opt_str(record, "modified"),
        ],
    )?;

    for alias in &aliases {
        conn.execute(
            "INSERT OR IGNORE INTO generic_entity_aliases (entity_id, name) VALUES (?1, ?2)",
            params![id, alias],
        )?;
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn store_with_schema() -> EntityStore {
        let mut store = EntityStore::open_in_memory().unwrap();
        store.setup().unwrap();
        store
    }

    #[test]
    fn test_capabilities_on_full_schema() {
        let store = store_with_schema();
        let caps = store.capabilities();

        assert!(caps.company_alias_relation);
        assert!(caps.generic_entity_alias_relation);
        assert_eq!(caps.company_alias_columns, vec!["aliases", "alt_names", "aka"]);
        assert_eq!(
            caps.generic_entity_alias_columns,
            vec!["aliases", "alt_names", "aka", "aka_names"]
        );
        assert!(caps.has_any_alias_support());
    }

    #[test]
    fn test_capabilities_on_reduced_schema() {
        let store = EntityStore::open_in_memory().unwrap();
        {
            let conn = store.lock();
            conn.execute(
                "CREATE TABLE companies (id TEXT PRIMARY KEY, name TEXT NOT NULL,
                 type TEXT NOT NULL, longname TEXT)",
                [],
            )
            .unwrap();
            conn.execute(
                "CREATE TABLE generic_entities (id TEXT PRIMARY KEY, name TEXT NOT NULL,
                 type TEXT NOT NULL)",
                [],
            )
            .unwrap();
        }
        let caps = probe_capabilities(&store.lock()).unwrap();

        assert!(!caps.company_alias_relation);
        assert!(!caps.generic_entity_alias_relation);
        assert!(caps.company_alias_columns.is_empty());
        assert!(caps.generic_entity_alias_columns.is_empty());
        assert!(!caps.has_any_alias_support());
    }

    #[test]
    fn test_registry_routes_by_type_tag() {
        let registry = UpsertRegistry::with_defaults();

        assert_eq!(registry.route_for("Company").table, "companies");
        assert_eq!(registry.route_for("Username").table, "usernames");
        assert_eq!(registry.route_for("City").table, "locations");
        assert_eq!(registry.route_for("Airport").table, "locations");
        assert_eq!(
            registry.route_for("InternetDomainName").table,
            "internet_domain_names"
        );
        // Anything unrecognized falls through to generic entities
        assert_eq!(registry.route_for("Organization").table, "generic_entities");
        assert_eq!(registry.route_for("").table, "generic_entities");
    }

    #[test]
    fn test_registry_accepts_new_routes() {
        fn noop(_: &Connection, _: &Value) -> Result<()> {
            Ok(())
        }

        let mut registry = UpsertRegistry::with_defaults();
        registry.register(UpsertRoute {
            table: "locations",
            tags: &["Country"],
            upsert: noop,
        });

        assert_eq!(registry.route_for("Country").table, "locations");
    }

    #[test]
    fn test_upsert_company_writes_both_alias_representations() {
        let store = store_with_schema();
        let registry = UpsertRegistry::with_defaults();
        let conn = store.lock();

        let table = registry
            .upsert(
                &conn,
                &json!({
                    "id": "c1",
                    "name": "Acme Inc",
                    "type": "Company",
                    "longname": "Acme Incorporated",
                    "curated": 1,
                    "alias": ["ACME", "Acme Corp"]
                }),
            )
            .unwrap();
        assert_eq!(table, "companies");

        let aliases: String = conn
            .query_row("SELECT aliases FROM companies WHERE id = 'c1'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(
            serde_json::from_str::<Vec<String>>(&aliases).unwrap(),
            vec!["ACME".to_string(), "Acme Corp".to_string()]
        );

        let relation_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM company_aliases WHERE company_id = 'c1'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(relation_count, 2);
    }

    #[test]
    fn test_upsert_is_idempotent_by_id() {
        let store = store_with_schema();
        let registry = UpsertRegistry::with_defaults();
        let conn = store.lock();

        let record = json!({ "id": "c1", "name": "Acme", "type": "Company" });
        registry.upsert(&conn, &record).unwrap();
        registry.upsert(&conn, &record).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM companies", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_generic_entity_bags_unknown_fields_into_attributes() {
        let store = store_with_schema();
        let registry = UpsertRegistry::with_defaults();
        let conn = store.lock();

        registry
            .upsert(
                &conn,
                &json!({
                    "id": "g1",
                    "name": "Widget Org",
                    "type": "Organization",
                    "industry": "widgets",
                    "employees": 12
                }),
            )
            .unwrap();

        let attributes: String = conn
            .query_row(
                "SELECT attributes FROM generic_entities WHERE id = 'g1'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        let parsed: Value = serde_json::from_str(&attributes).unwrap();
        assert_eq!(parsed["industry"], "widgets");
        assert_eq!(parsed["employees"], 12);
    }

    #[test]
    fn test_seed_from_json_routes_and_reports() {
        let mut store = EntityStore::open_in_memory().unwrap();
        store.setup().unwrap();

        let seed = json!({
            "e1": { "id": "e1", "name": "Acme", "type": "Company" },
            "e2": { "id": "e2", "name": "acme.com", "type": "InternetDomainName" },
            "e3": { "id": "e3", "name": "Springfield", "type": "City" },
            "e4": { "id": "e4", "name": "alice", "type": "Username" },
            "e5": { "id": "e5", "name": "Widget Org", "type": "Organization" },
            "bad": { "id": "e6", "type": "Company" }
        });

        let mut file = tempfile_path();
        write!(file.1, "{}", seed).unwrap();
        let report = store.seed_from_json(&file.0).unwrap();

        assert_eq!(report.seeded, 5);
        assert_eq!(report.skipped, 1); // record without a name

        let counts = store.entity_counts().unwrap();
        for (table, count) in counts {
            match table {
                "usernames" | "companies" | "locations" | "internet_domain_names"
                | "generic_entities" => assert_eq!(count, 1, "table {}", table),
                other => panic!("unexpected table {}", other),
            }
        }
        std::fs::remove_file(&file.0).ok();
    }

    #[test]
    fn test_sample_returns_first_records() {
        let store = store_with_schema();
        {
            let registry = UpsertRegistry::with_defaults();
            let conn = store.lock();
            for i in 0..15 {
                registry
                    .upsert(
                        &conn,
                        &json!({
                            "id": format!("c{}", i),
                            "name": format!("Company {}", i),
                            "type": "Company"
                        }),
                    )
                    .unwrap();
            }
        }

        let sample = store.sample(EntityType::Company, 10).unwrap();
        assert_eq!(sample.len(), 10);
        assert_eq!(sample[0].name, "Company 0");
        assert_eq!(sample[0].entity_type, EntityType::Company);
    }

    fn tempfile_path() -> (std::path::PathBuf, std::fs::File) {
        let path = std::env::temp_dir().join(format!("entities-{}.json", Uuid::new_v4()));
        let file = std::fs::File::create(&path).unwrap();
        (path, file)
    }
}
