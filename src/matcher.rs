// Match Resolver - best-match selection per row, concurrent batch fan-out
//
// Per row: extract signals, fan the four lookups out concurrently, then
// pick one best match under a fixed precedence. Rows in a batch resolve
// concurrently with no ordering dependency; results come back in input
// order. A store error fails the whole batch - optional-schema degradation
// was already absorbed inside the lookup gateway.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::spawn_blocking;

use crate::entity::{Entity, EntityType};
use crate::extract::{extract_signals, ExtractedSignals};
use crate::row::Row;
use crate::store::EntityStore;

/// Candidate cap for company and generic-entity lookups.
pub const ORGANIZATION_CANDIDATE_LIMIT: usize = 25;

/// Candidate cap for domain substring lookups.
pub const DOMAIN_CANDIDATE_LIMIT: usize = 10;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Candidate lists for one row, in the store's insertion order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSet {
    pub organizations: Vec<Entity>,
    pub generic_entities: Vec<Entity>,
    pub domains: Vec<Entity>,
}

/// The single entity selected for a row under the precedence policy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestMatch {
    pub entity_type: EntityType,
    pub entity: Entity,
}

/// Outcome for one row. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub index: usize,
    pub input: Row,
    pub extracted: ExtractedSignals,
    pub candidates: CandidateSet,
    pub best_match: Option<BestMatch>,
}

/// Aggregate over one uploaded batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub file_name: Option<String>,
    pub total_rows: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// MATCH ENGINE
// ============================================================================

#[derive(Clone)]
pub struct MatchEngine {
    store: Arc<EntityStore>,
}

impl MatchEngine {
    pub fn new(store: Arc<EntityStore>) -> Self {
        MatchEngine { store }
    }

    /// Resolve one row: extract, look up, select.
    ///
    /// All four lookup groups are issued concurrently and awaited jointly.
    pub async fn resolve_row(&self, row: Row, index: usize) -> Result<MatchResult> {
        let extracted = extract_signals(&row);
        let organization = extracted.organization_name.clone();
        let hostname = extracted.website_hostname.clone();

        let companies = {
            let store = self.store.clone();
            let query = organization.clone();
            spawn_blocking(move || match query {
                Some(q) => store.find_companies(&q, ORGANIZATION_CANDIDATE_LIMIT),
                None => Ok(Vec::new()),
            })
        };
        let generics = {
            let store = self.store.clone();
            let query = organization.clone();
            spawn_blocking(move || match query {
                Some(q) => store.find_generic_entities(&q, ORGANIZATION_CANDIDATE_LIMIT),
                None => Ok(Vec::new()),
            })
        };
        let domains = {
            let store = self.store.clone();
            let query = hostname.clone();
            spawn_blocking(move || match query {
                Some(q) => store.find_domains(&q, DOMAIN_CANDIDATE_LIMIT),
                None => Ok(Vec::new()),
            })
        };
        let exact_domain = {
            let store = self.store.clone();
            let query = hostname.clone();
            spawn_blocking(move || match query {
                Some(q) => store.find_domain_exact(&q),
                None => Ok(None),
            })
        };

        let (companies, generics, domains, exact_domain) =
            tokio::join!(companies, generics, domains, exact_domain);
        let companies = companies.context("company lookup task failed")??;
        let generics = generics.context("generic-entity lookup task failed")??;
        let domains = domains.context("domain lookup task failed")??;
        let exact_domain = exact_domain.context("exact-domain lookup task failed")??;

        let best_match = select_best_match(&exact_domain, &companies, &generics, &domains);

        Ok(MatchResult {
            index,
            input: row,
            extracted,
            candidates: CandidateSet {
                organizations: companies,
                generic_entities: generics,
                domains,
            },
            best_match,
        })
    }

    /// Resolve a whole batch concurrently. Results come back in input
    /// order with `index` 0..N-1.
    pub async fn resolve_batch(&self, rows: Vec<Row>) -> Result<Vec<MatchResult>> {
        let futures = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| self.resolve_row(row, index));
        join_all(futures).await.into_iter().collect()
    }
}

/// Fixed precedence, first match wins: exact domain, first company, first
/// generic entity, first substring domain.
fn select_best_match(
    exact_domain: &Option<Entity>,
    companies: &[Entity],
    generics: &[Entity],
    domains: &[Entity],
) -> Option<BestMatch> {
    if let Some(entity) = exact_domain {
        return Some(BestMatch {
            entity_type: EntityType::InternetDomainName,
            entity: entity.clone(),
        });
    }
    if let Some(entity) = companies.first() {
        return Some(BestMatch {
            entity_type: EntityType::Company,
            entity: entity.clone(),
        });
    }
    if let Some(entity) = generics.first() {
        return Some(BestMatch {
            entity_type: EntityType::GenericEntity,
            entity: entity.clone(),
        });
    }
    if let Some(entity) = domains.first() {
        return Some(BestMatch {
            entity_type: EntityType::InternetDomainName,
            entity: entity.clone(),
        });
    }
    None
}

// ============================================================================
// BATCH SUMMARY BUILDER
// ============================================================================

/// Pure aggregation: count matched vs unmatched, stamp the result.
pub fn summarize(
    results: &[MatchResult],
    file_name: Option<String>,
    total_rows: usize,
) -> BatchSummary {
    let matched = results.iter().filter(|r| r.best_match.is_some()).count();
    let unmatched = results.iter().filter(|r| r.best_match.is_none()).count();

    BatchSummary {
        file_name,
        total_rows,
        matched,
        unmatched,
        timestamp: Utc::now(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UpsertRegistry;
    use serde_json::{json, Value};

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => Row::from_json_object(&map),
            _ => panic!("expected JSON object"),
        }
    }

    fn engine_with(records: &[Value]) -> MatchEngine {
        let mut store = EntityStore::open_in_memory().unwrap();
        store.setup().unwrap();
        {
            let registry = UpsertRegistry::with_defaults();
            let conn = store.lock();
            for record in records {
                registry.upsert(&conn, record).unwrap();
            }
        }
        MatchEngine::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_exact_domain_beats_company_candidates() {
        let engine = engine_with(&[
            json!({ "id": "c1", "name": "Acme Inc", "type": "Company" }),
            json!({ "id": "d1", "name": "acme.com", "type": "InternetDomainName" }),
        ]);

        let result = engine
            .resolve_row(row(json!({ "name": "Acme Inc", "website": "acme.com" })), 0)
            .await
            .unwrap();

        let best = result.best_match.unwrap();
        assert_eq!(best.entity_type, EntityType::InternetDomainName);
        assert_eq!(best.entity.id, "d1");
        // Company candidates were still collected
        assert_eq!(result.candidates.organizations.len(), 1);
    }

    #[tokio::test]
    async fn test_company_beats_generic_and_substring_domain() {
        let engine = engine_with(&[
            json!({ "id": "c1", "name": "Acme Inc", "type": "Company" }),
            json!({ "id": "g1", "name": "Acme Collective", "type": "Organization" }),
            json!({ "id": "d2", "name": "shop.acme.com", "type": "InternetDomainName" }),
        ]);

        let result = engine
            .resolve_row(row(json!({ "name": "Acme", "website": "acme.com" })), 0)
            .await
            .unwrap();

        let best = result.best_match.unwrap();
        assert_eq!(best.entity_type, EntityType::Company);
        assert_eq!(best.entity.id, "c1");
        assert!(!result.candidates.generic_entities.is_empty());
        assert!(!result.candidates.domains.is_empty());
    }

    #[tokio::test]
    async fn test_generic_entity_beats_substring_domain() {
        let engine = engine_with(&[
            json!({ "id": "g1", "name": "Acme Collective", "type": "Organization" }),
            json!({ "id": "d2", "name": "shop.acme.com", "type": "InternetDomainName" }),
        ]);

        let result = engine
            .resolve_row(row(json!({ "name": "Acme", "website": "acme.com" })), 0)
            .await
            .unwrap();

        let best = result.best_match.unwrap();
        assert_eq!(best.entity_type, EntityType::GenericEntity);
        assert_eq!(best.entity.id, "g1");
    }

    #[tokio::test]
    async fn test_substring_domain_is_last_resort() {
        let engine = engine_with(&[
            json!({ "id": "d2", "name": "shop.acme.com", "type": "InternetDomainName" }),
        ]);

        let result = engine
            .resolve_row(row(json!({ "website": "acme.com" })), 0)
            .await
            .unwrap();

        let best = result.best_match.unwrap();
        assert_eq!(best.entity_type, EntityType::InternetDomainName);
        assert_eq!(best.entity.id, "d2");
    }

    #[tokio::test]
    async fn test_row_without_signals_has_no_candidates() {
        let engine = engine_with(&[
            json!({ "id": "c1", "name": "Acme Inc", "type": "Company" }),
        ]);

        let result = engine.resolve_row(row(json!({ "a": null })), 3).await.unwrap();

        assert_eq!(result.index, 3);
        assert_eq!(result.extracted.organization_name, None);
        assert_eq!(result.extracted.website_hostname, None);
        assert!(result.candidates.organizations.is_empty());
        assert!(result.candidates.generic_entities.is_empty());
        assert!(result.candidates.domains.is_empty());
        assert!(result.best_match.is_none());
    }

    #[tokio::test]
    async fn test_batch_preserves_input_order() {
        let engine = engine_with(&[
            json!({ "id": "c1", "name": "Acme Inc", "type": "Company" }),
        ]);

        let rows: Vec<Row> = (0..8)
            .map(|i| row(json!({ "name": format!("row {}", i), "company": "Acme" })))
            .collect();
        let results = engine.resolve_batch(rows).await.unwrap();

        assert_eq!(results.len(), 8);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.index, i);
        }
    }

    #[tokio::test]
    async fn test_acme_scenario_end_to_end() {
        // Store has a company "Acme Inc" and no exact domain for acme.com
        let engine = engine_with(&[
            json!({ "id": "c1", "name": "Acme Inc", "type": "Company" }),
        ]);

        let rows = vec![
            row(json!({ "name": "Acme Inc", "website": "acme.com" })),
            row(json!({ "foo": "bar" })),
        ];
        let total = rows.len();
        let results = engine.resolve_batch(rows).await.unwrap();

        let best = results[0].best_match.as_ref().unwrap();
        assert_eq!(best.entity_type, EntityType::Company);
        assert_eq!(best.entity.id, "c1");
        assert!(results[1].best_match.is_none());

        let summary = summarize(&results, Some("upload.csv".to_string()), total);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.unmatched, 1);
        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.matched + summary.unmatched, summary.total_rows);
    }

    #[tokio::test]
    async fn test_result_serializes_with_wire_names() {
        let engine = engine_with(&[
            json!({ "id": "d1", "name": "acme.com", "type": "InternetDomainName" }),
        ]);

        let result = engine
            .resolve_row(row(json!({ "Website": "https://www.acme.com/x" })), 0)
            .await
            .unwrap();
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["index"], 0);
        assert_eq!(value["extracted"]["websiteHostname"], "acme.com");
        assert_eq!(value["bestMatch"]["entityType"], "InternetDomainName");
        assert!(value["candidates"]["genericEntities"].is_array());
    }

    #[test]
    fn test_summary_counts_and_timestamp() {
        let summary = summarize(&[], None, 0);
        assert_eq!(summary.total_rows, 0);
        assert_eq!(summary.matched + summary.unmatched, 0);

        let value = serde_json::to_value(&summary).unwrap();
        assert!(value["fileName"].is_null());
        // chrono serializes as RFC 3339
        let raw = value["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(raw).is_ok());
    }
}
