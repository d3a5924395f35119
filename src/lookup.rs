// Entity Lookup Gateway - alias-aware substring queries per collection
//
// Each lookup runs a baseline name substring query, then widens it with
// whichever alias representations the deployment's schema carries:
// a relation table ("has an alias record whose name matches") and/or JSON
// array columns (exact case-insensitive membership). An enhanced result
// set is adopted when it returns at least as many rows as the currently
// preferred set, so alias-aware lookups never return fewer rows than the
// baseline.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use crate::entity::{Entity, EntityType};
use crate::store::{EntityStore, StoreCapabilities};

/// Adopt the enhanced set when it is at least as large as the current one.
fn prefer(current: Vec<Entity>, enhanced: Vec<Entity>) -> Vec<Entity> {
    if enhanced.len() >= current.len() {
        enhanced
    } else {
        current
    }
}

/// Build a substring LIKE pattern with `%`/`_` in the query escaped so they
/// match literally. Every LIKE in this module pairs with `ESCAPE '\'`.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// OR-chain of JSON-array membership tests over the present alias columns.
/// Missing column values are treated as empty arrays.
fn array_alias_clause(table: &str, columns: &[String], param: &str) -> String {
    columns
        .iter()
        .map(|col| {
            format!(
                " OR EXISTS (SELECT 1 FROM json_each(coalesce({table}.{col}, '[]')) \
                 WHERE json_each.value = {param} COLLATE NOCASE)"
            )
        })
        .collect()
}

// ============================================================================
// COMPANIES
// ============================================================================

const COMPANY_COLUMNS: &str = "id, name, meta_type, longname, curated, hits";

fn read_company(row: &rusqlite::Row<'_>, alias_column_count: usize) -> rusqlite::Result<Entity> {
    let mut entity = Entity::new(row.get(0)?, row.get(1)?, EntityType::Company);
    entity.meta_type = row.get(2)?;
    entity.longname = row.get(3)?;
    entity.curated = row.get::<_, Option<i64>>(4)?.map(|v| v != 0);
    entity.hits = row.get(5)?;
    entity.aliases = read_alias_columns(row, 6, alias_column_count)?;
    Ok(entity)
}

/// Case-insensitive substring match on company name/longname, widened by
/// whatever alias support the schema carries.
pub fn find_companies_by_name_or_alias(
    conn: &Connection,
    capabilities: &StoreCapabilities,
    query: &str,
    limit: usize,
) -> Result<Vec<Entity>> {
    let alias_columns = &capabilities.company_alias_columns;
    let select = company_select(alias_columns);
    let pattern = like_pattern(query);

    let baseline = {
        let sql = format!(
            "{select} WHERE name LIKE ?1 ESCAPE '\\' OR longname LIKE ?1 ESCAPE '\\' \
             ORDER BY rowid LIMIT ?2"
        );
        query_companies(conn, &sql, &pattern, query, limit, alias_columns.len(), false)?
    };
    let mut preferred = baseline;

    if capabilities.company_alias_relation {
        let sql = format!(
            "{select} WHERE name LIKE ?1 ESCAPE '\\' OR longname LIKE ?1 ESCAPE '\\' \
             OR id IN (SELECT company_id FROM company_aliases WHERE name LIKE ?1 ESCAPE '\\') \
             ORDER BY rowid LIMIT ?2"
        );
        let relation =
            query_companies(conn, &sql, &pattern, query, limit, alias_columns.len(), false)?;
        preferred = prefer(preferred, relation);
    }

    if !alias_columns.is_empty() {
        let clause = array_alias_clause("companies", alias_columns, "?3");
        let sql = format!(
            "{select} WHERE name LIKE ?1 ESCAPE '\\' OR longname LIKE ?1 ESCAPE '\\'{clause} \
             ORDER BY rowid LIMIT ?2"
        );
        let array =
            query_companies(conn, &sql, &pattern, query, limit, alias_columns.len(), true)?;
        preferred = prefer(preferred, array);
    }

    Ok(preferred)
}

fn company_select(alias_columns: &[String]) -> String {
    let mut columns = String::from(COMPANY_COLUMNS);
    for col in alias_columns {
        columns.push_str(", ");
        columns.push_str(col);
    }
    format!("SELECT {columns} FROM companies")
}

fn query_companies(
    conn: &Connection,
    sql: &str,
    pattern: &str,
    query: &str,
    limit: usize,
    alias_column_count: usize,
    with_query_param: bool,
) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare(sql)?;
    let mapper = |row: &rusqlite::Row<'_>| read_company(row, alias_column_count);
    let rows = if with_query_param {
        stmt.query_map(params![pattern, limit as i64, query], mapper)?
            .collect::<rusqlite::Result<Vec<Entity>>>()?
    } else {
        stmt.query_map(params![pattern, limit as i64], mapper)?
            .collect::<rusqlite::Result<Vec<Entity>>>()?
    };
    Ok(rows)
}

// ============================================================================
// GENERIC ENTITIES
// ============================================================================

const GENERIC_COLUMNS: &str = "id, name, meta_type, curated, hits, attributes";

fn read_generic(row: &rusqlite::Row<'_>, alias_column_count: usize) -> rusqlite::Result<Entity> {
    let mut entity = Entity::new(row.get(0)?, row.get(1)?, EntityType::GenericEntity);
    entity.meta_type = row.get(2)?;
    entity.curated = row.get::<_, Option<i64>>(3)?.map(|v| v != 0);
    entity.hits = row.get(4)?;
    if let Some(raw) = row.get::<_, Option<String>>(5)? {
        entity.attributes = serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null);
    }
    entity.aliases = read_alias_columns(row, 6, alias_column_count)?;
    Ok(entity)
}

/// Case-insensitive substring match on generic-entity name, widened by
/// available alias support.
pub fn find_generic_entities_by_name_or_alias(
    conn: &Connection,
    capabilities: &StoreCapabilities,
    query: &str,
    limit: usize,
) -> Result<Vec<Entity>> {
    let alias_columns = &capabilities.generic_entity_alias_columns;
    let select = generic_select(alias_columns);
    let pattern = like_pattern(query);

    let baseline = {
        let sql =
            format!("{select} WHERE name LIKE ?1 ESCAPE '\\' ORDER BY rowid LIMIT ?2");
        query_generics(conn, &sql, &pattern, query, limit, alias_columns.len(), false)?
    };
    let mut preferred = baseline;

    if capabilities.generic_entity_alias_relation {
        let sql = format!(
            "{select} WHERE name LIKE ?1 ESCAPE '\\' \
             OR id IN (SELECT entity_id FROM generic_entity_aliases \
             WHERE name LIKE ?1 ESCAPE '\\') \
             ORDER BY rowid LIMIT ?2"
        );
        let relation =
            query_generics(conn, &sql, &pattern, query, limit, alias_columns.len(), false)?;
        preferred = prefer(preferred, relation);
    }

    if !alias_columns.is_empty() {
        let clause = array_alias_clause("generic_entities", alias_columns, "?3");
        let sql = format!(
            "{select} WHERE name LIKE ?1 ESCAPE '\\'{clause} ORDER BY rowid LIMIT ?2"
        );
        let array =
            query_generics(conn, &sql, &pattern, query, limit, alias_columns.len(), true)?;
        preferred = prefer(preferred, array);
    }

    Ok(preferred)
}

fn generic_select(alias_columns: &[String]) -> String {
    let mut columns = String::from(GENERIC_COLUMNS);
    for col in alias_columns {
        columns.push_str(", ");
        columns.push_str(col);
    }
    format!("SELECT {columns} FROM generic_entities")
}

fn query_generics(
    conn: &Connection,
    sql: &str,
    pattern: &str,
    query: &str,
    limit: usize,
    alias_column_count: usize,
    with_query_param: bool,
) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare(sql)?;
    let mapper = |row: &rusqlite::Row<'_>| read_generic(row, alias_column_count);
    let rows = if with_query_param {
        stmt.query_map(params![pattern, limit as i64, query], mapper)?
            .collect::<rusqlite::Result<Vec<Entity>>>()?
    } else {
        stmt.query_map(params![pattern, limit as i64], mapper)?
            .collect::<rusqlite::Result<Vec<Entity>>>()?
    };
    Ok(rows)
}

// ============================================================================
// DOMAIN NAMES
// ============================================================================

const DOMAIN_COLUMNS: &str = "id, name, meta_type, curated, hits, level";

fn read_domain(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entity> {
    let mut entity = Entity::new(row.get(0)?, row.get(1)?, EntityType::InternetDomainName);
    entity.meta_type = row.get(2)?;
    entity.curated = row.get::<_, Option<i64>>(3)?.map(|v| v != 0);
    entity.hits = row.get(4)?;
    if let Some(level) = row.get::<_, Option<i64>>(5)? {
        entity.attributes = serde_json::json!({ "level": level });
    }
    Ok(entity)
}

/// Substring match on domain name. No alias tiers - domain records carry
/// only their name.
pub fn find_domains_by_name(conn: &Connection, query: &str, limit: usize) -> Result<Vec<Entity>> {
    let pattern = like_pattern(query);
    let sql = format!(
        "SELECT {DOMAIN_COLUMNS} FROM internet_domain_names \
         WHERE name LIKE ?1 ESCAPE '\\' ORDER BY rowid LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![pattern, limit as i64], read_domain)?
        .collect::<rusqlite::Result<Vec<Entity>>>()?;
    Ok(rows)
}

/// Exact-match domain lookup, used for the highest-precedence match tier.
pub fn find_domain_exact(conn: &Connection, hostname: &str) -> Result<Option<Entity>> {
    let sql = format!(
        "SELECT {DOMAIN_COLUMNS} FROM internet_domain_names WHERE name = ?1 LIMIT 1"
    );
    let entity = conn
        .query_row(&sql, params![hostname], read_domain)
        .optional()?;
    Ok(entity)
}

// ============================================================================
// SHARED READERS
// ============================================================================

/// Merge the JSON alias arrays trailing the base columns, deduplicated.
fn read_alias_columns(
    row: &rusqlite::Row<'_>,
    first_index: usize,
    count: usize,
) -> rusqlite::Result<Vec<String>> {
    let mut aliases: Vec<String> = Vec::new();
    for offset in 0..count {
        if let Some(raw) = row.get::<_, Option<String>>(first_index + offset)? {
            if let Ok(values) = serde_json::from_str::<Vec<String>>(&raw) {
                for value in values {
                    if !aliases.contains(&value) {
                        aliases.push(value);
                    }
                }
            }
        }
    }
    Ok(aliases)
}

// ============================================================================
// STORE-LEVEL API
// ============================================================================

impl EntityStore {
    /// Company candidates for an extracted organization name.
    pub fn find_companies(&self, query: &str, limit: usize) -> Result<Vec<Entity>> {
        let conn = self.lock();
        find_companies_by_name_or_alias(&conn, self.capabilities(), query, limit)
    }

    /// Generic-entity candidates for an extracted organization name.
    pub fn find_generic_entities(&self, query: &str, limit: usize) -> Result<Vec<Entity>> {
        let conn = self.lock();
        find_generic_entities_by_name_or_alias(&conn, self.capabilities(), query, limit)
    }

    /// Domain candidates for an extracted hostname (substring).
    pub fn find_domains(&self, query: &str, limit: usize) -> Result<Vec<Entity>> {
        let conn = self.lock();
        find_domains_by_name(&conn, query, limit)
    }

    /// Exact domain record for a hostname, if one exists.
    pub fn find_domain_exact(&self, hostname: &str) -> Result<Option<Entity>> {
        let conn = self.lock();
        find_domain_exact(&conn, hostname)
    }
}

// ============================================================================
// TESTS
// ============================================================================
