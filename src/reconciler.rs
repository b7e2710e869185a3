use crate::error::{BudgetError, Result};
use crate::schema::BudgetRecord;
use crate::taxonomy::Category;
use crate::ScopeContext;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;

/// A document-store payload: field absent and field present are distinct
/// states, which is why payloads are maps rather than full records.
pub type Document = serde_json::Map<String, Value>;

/// Contract for the backing document store. Implementations own all I/O,
/// cancellation and timeout behavior; the reconciler issues at most one call
/// per logical step and never retries.
#[allow(async_fn_in_trait)]
pub trait BudgetStore {
    /// All budget records for a (company, season) scope. Order unspecified.
    async fn fetch_budgets(&self, company_id: &str, season_id: &str) -> Result<Vec<BudgetRecord>>;

    /// Persists a new record and returns the assigned id.
    async fn create_budget(&self, payload: &Document) -> Result<String>;

    async fn update_budget(&self, id: &str, payload: &Document) -> Result<()>;

    async fn delete_budget(&self, id: &str) -> Result<()>;

    /// Records matching one (company, season, crop) triple. Under the
    /// uniqueness invariant the result has length 0 or 1; anything longer is
    /// corruption and is surfaced by the reconciler, never resolved silently.
    async fn query_by_triple(
        &self,
        company_id: &str,
        season_id: &str,
        crop_id: &str,
    ) -> Result<Vec<BudgetRecord>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    Update { id: String },
    Create,
}

/// Decides whether a save updates an existing record or creates a new one.
///
/// Resolution order:
/// 1. A candidate that already carries an id targets that id directly; the
///    caller loaded it from the store.
/// 2. Otherwise the store is queried by triple; a single hit is updated in
///    place. This de-duplicates against a second editor having created the
///    record since the caller last fetched.
/// 3. An empty query result means a genuine create.
///
/// This is best-effort de-duplication, not a transaction: two concurrent
/// saves of the same previously-unsaved triple can still race between the
/// query and the write. Closing that window would need a conditional write
/// at the store level.
pub async fn resolve_save_target<S: BudgetStore>(
    store: &S,
    candidate: &BudgetRecord,
) -> Result<SaveTarget> {
    if let Some(id) = &candidate.id {
        return Ok(SaveTarget::Update { id: id.clone() });
    }

    let existing = store
        .query_by_triple(&candidate.company_id, &candidate.season_id, &candidate.crop_id)
        .await?;

    match existing.len() {
        0 => Ok(SaveTarget::Create),
        1 => {
            let id = existing[0].id.clone().ok_or_else(|| {
                BudgetError::StoreUnavailable(
                    "triple query returned a record without an id".to_string(),
                )
            })?;
            debug!(
                "Draft for crop {} matched existing record {}; updating in place",
                candidate.crop_id, id
            );
            Ok(SaveTarget::Update { id })
        }
        count => {
            warn!(
                "Found {} allocations for company {}, season {}, crop {}; refusing to save",
                count, candidate.company_id, candidate.season_id, candidate.crop_id
            );
            Err(BudgetError::DuplicateAllocation {
                company_id: candidate.company_id.clone(),
                season_id: candidate.season_id.clone(),
                crop_id: candidate.crop_id.clone(),
                count,
            })
        }
    }
}

/// Builds the store payload for a record: drops the id, strips any fields
/// without a value, and stamps `updatedAt`. `createdAt` is added separately
/// on the create path only.
pub fn sanitize(record: &BudgetRecord, now: DateTime<Utc>) -> Result<Document> {
    let mut doc = match serde_json::to_value(record)? {
        Value::Object(map) => map,
        other => {
            return Err(BudgetError::StoreUnavailable(format!(
                "budget record serialized to a non-object value: {}",
                other
            )))
        }
    };

    doc.remove("id");
    doc.retain(|_, value| !value.is_null());
    doc.insert("updatedAt".to_string(), serde_json::to_value(now)?);

    Ok(doc)
}

/// Full save path: resolve the target, sanitize, write once. Returns the
/// persisted id. A store failure propagates unchanged and commits nothing;
/// callers must keep showing their prior state on error.
pub async fn save_budget<S: BudgetStore>(store: &S, record: &BudgetRecord) -> Result<String> {
    let target = resolve_save_target(store, record).await?;
    let now = Utc::now();
    let mut payload = sanitize(record, now)?;

    match target {
        SaveTarget::Update { id } => {
            store.update_budget(&id, &payload).await?;
            Ok(id)
        }
        SaveTarget::Create => {
            payload.insert("createdAt".to_string(), serde_json::to_value(now)?);
            store.create_budget(&payload).await
        }
    }
}

/// Saves several records concurrently. Safe only when the records cover
/// distinct triples; ordering between the writes is unspecified. Fails fast
/// on the first error.
pub async fn save_budgets<S: BudgetStore>(
    store: &S,
    records: &[BudgetRecord],
) -> Result<Vec<String>> {
    try_join_all(records.iter().map(|record| save_budget(store, record))).await
}

/// Fetches a scope's records keyed by crop id, the shape the editing UI and
/// the merge path work with.
pub async fn fetch_budget_map<S: BudgetStore>(
    store: &S,
    scope: &ScopeContext,
) -> Result<BTreeMap<String, BudgetRecord>> {
    let records = store
        .fetch_budgets(&scope.company_id, &scope.season_id)
        .await?;
    Ok(records
        .into_iter()
        .map(|record| (record.crop_id.clone(), record))
        .collect())
}

/// Applies one category edit as an immutable merge: the existing record (or a
/// fresh draft when the crop has none) is copied with the single field
/// replaced and the scope triple stamped. The input record is left untouched
/// for auditability.
pub fn merge_category_update(
    existing: Option<&BudgetRecord>,
    scope: &ScopeContext,
    crop_id: &str,
    category: Category,
    value: f64,
) -> Result<BudgetRecord> {
    if !value.is_finite() || value < 0.0 {
        return Err(BudgetError::Validation {
            crop_id: crop_id.to_string(),
            category: category.key().to_string(),
            details: format!("value {} is not a valid budget amount", value),
        });
    }

    let mut merged = match existing {
        Some(record) => record.clone(),
        None => BudgetRecord::draft(&scope.company_id, &scope.season_id, crop_id),
    };
    merged.company_id = scope.company_id.clone();
    merged.season_id = scope.season_id.clone();
    merged.crop_id = crop_id.to_string();
    merged.amounts.set(category, value);

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory document store mirroring the equality-filter queries of the
    /// real backend.
    #[derive(Default)]
    struct MemoryStore {
        docs: Mutex<BTreeMap<String, Document>>,
        next_id: AtomicUsize,
    }

    impl MemoryStore {
        fn insert_raw(&self, doc: Document) -> String {
            let id = format!("b{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
            self.docs.lock().unwrap().insert(id.clone(), doc);
            id
        }

        fn record(&self, id: &str) -> BudgetRecord {
            let docs = self.docs.lock().unwrap();
            let mut doc = docs.get(id).cloned().unwrap();
            doc.insert("id".to_string(), Value::String(id.to_string()));
            serde_json::from_value(Value::Object(doc)).unwrap()
        }

        fn len(&self) -> usize {
            self.docs.lock().unwrap().len()
        }

        fn matches(doc: &Document, field: &str, expected: &str) -> bool {
            doc.get(field).and_then(Value::as_str) == Some(expected)
        }
    }

    impl BudgetStore for MemoryStore {
        async fn fetch_budgets(
            &self,
            company_id: &str,
            season_id: &str,
        ) -> Result<Vec<BudgetRecord>> {
            let docs = self.docs.lock().unwrap();
            Ok(docs
                .iter()
                .filter(|(_, doc)| {
                    Self::matches(doc, "companyId", company_id)
                        && Self::matches(doc, "seasonId", season_id)
                })
                .map(|(id, doc)| {
                    let mut doc = doc.clone();
                    doc.insert("id".to_string(), Value::String(id.clone()));
                    serde_json::from_value(Value::Object(doc)).unwrap()
                })
                .collect())
        }

        async fn create_budget(&self, payload: &Document) -> Result<String> {
            Ok(self.insert_raw(payload.clone()))
        }

        async fn update_budget(&self, id: &str, payload: &Document) -> Result<()> {
            let mut docs = self.docs.lock().unwrap();
            let doc = docs
                .get_mut(id)
                .ok_or_else(|| BudgetError::NotFound(id.to_string()))?;
            for (key, value) in payload {
                doc.insert(key.clone(), value.clone());
            }
            Ok(())
        }

        async fn delete_budget(&self, id: &str) -> Result<()> {
            self.docs
                .lock()
                .unwrap()
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| BudgetError::NotFound(id.to_string()))
        }

        async fn query_by_triple(
            &self,
            company_id: &str,
            season_id: &str,
            crop_id: &str,
        ) -> Result<Vec<BudgetRecord>> {
            let records = self.fetch_budgets(company_id, season_id).await?;
            Ok(records
                .into_iter()
                .filter(|record| record.crop_id == crop_id)
                .collect())
        }
    }

    /// Store whose writes always fail, for the atomic-failure contract.
    struct UnavailableStore;

    impl BudgetStore for UnavailableStore {
        async fn fetch_budgets(&self, _: &str, _: &str) -> Result<Vec<BudgetRecord>> {
            Err(BudgetError::StoreUnavailable("offline".to_string()))
        }
        async fn create_budget(&self, _: &Document) -> Result<String> {
            Err(BudgetError::StoreUnavailable("offline".to_string()))
        }
        async fn update_budget(&self, _: &str, _: &Document) -> Result<()> {
            Err(BudgetError::StoreUnavailable("offline".to_string()))
        }
        async fn delete_budget(&self, _: &str) -> Result<()> {
            Err(BudgetError::StoreUnavailable("offline".to_string()))
        }
        async fn query_by_triple(&self, _: &str, _: &str, _: &str) -> Result<Vec<BudgetRecord>> {
            Ok(Vec::new())
        }
    }

    fn scope() -> ScopeContext {
        ScopeContext::new("c1", "s1")
    }

    fn draft_with(crop_id: &str, category: Category, value: f64) -> BudgetRecord {
        merge_category_update(None, &scope(), crop_id, category, value).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_trusts_caller_provided_id() {
        let store = MemoryStore::default();
        // A conflicting record exists for the same triple; the caller id
        // still wins without querying.
        let payload = sanitize(&draft_with("soy", Category::Seeds, 1.0), Utc::now()).unwrap();
        store.insert_raw(payload);

        let mut candidate = draft_with("soy", Category::Seeds, 2.0);
        candidate.id = Some("b99".to_string());

        let target = resolve_save_target(&store, &candidate).await.unwrap();
        assert_eq!(
            target,
            SaveTarget::Update {
                id: "b99".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_resolve_empty_query_creates() {
        let store = MemoryStore::default();
        let candidate = draft_with("soy", Category::Seeds, 1.0);
        let target = resolve_save_target(&store, &candidate).await.unwrap();
        assert_eq!(target, SaveTarget::Create);
    }

    #[tokio::test]
    async fn test_resolve_single_hit_updates_existing() {
        let store = MemoryStore::default();
        let payload = sanitize(&draft_with("soy", Category::Seeds, 1.0), Utc::now()).unwrap();
        let existing_id = store.insert_raw(payload);

        let candidate = draft_with("soy", Category::Seeds, 2.0);
        let target = resolve_save_target(&store, &candidate).await.unwrap();
        assert_eq!(target, SaveTarget::Update { id: existing_id });
    }

    #[tokio::test]
    async fn test_resolve_surfaces_duplicate_allocations() {
        let store = MemoryStore::default();
        let payload = sanitize(&draft_with("soy", Category::Seeds, 1.0), Utc::now()).unwrap();
        store.insert_raw(payload.clone());
        store.insert_raw(payload);

        let candidate = draft_with("soy", Category::Seeds, 2.0);
        let err = resolve_save_target(&store, &candidate).await.unwrap_err();
        match err {
            BudgetError::DuplicateAllocation { crop_id, count, .. } => {
                assert_eq!(crop_id, "soy");
                assert_eq!(count, 2);
            }
            other => panic!("Expected DuplicateAllocation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_save_creates_then_updates_without_duplicating() {
        let store = MemoryStore::default();
        let draft = draft_with("soy", Category::Seeds, 5.0);

        let id = save_budget(&store, &draft).await.unwrap();
        assert_eq!(store.len(), 1);

        let persisted = store.record(&id);
        assert!(persisted.created_at.is_some());
        assert!(persisted.updated_at.is_some());
        assert_eq!(persisted.amounts.get(Category::Seeds), 5.0);

        // Second save with the returned id edits in place
        let updated =
            merge_category_update(Some(&persisted), &scope(), "soy", Category::Seeds, 8.0).unwrap();
        let second_id = save_budget(&store, &updated).await.unwrap();
        assert_eq!(second_id, id);
        assert_eq!(store.len(), 1);
        assert_eq!(store.record(&id).amounts.get(Category::Seeds), 8.0);
    }

    #[tokio::test]
    async fn test_save_deduplicates_stale_draft_against_store() {
        // Two editors: the first saved already, the second still holds an
        // id-less draft for the same triple.
        let store = MemoryStore::default();
        let first = draft_with("soy", Category::Seeds, 5.0);
        let id = save_budget(&store, &first).await.unwrap();

        let stale_draft = draft_with("soy", Category::Planting, 3.0);
        let second_id = save_budget(&store, &stale_draft).await.unwrap();

        assert_eq!(second_id, id);
        assert_eq!(store.len(), 1);
        assert_eq!(store.record(&id).amounts.get(Category::Planting), 3.0);
    }

    #[tokio::test]
    async fn test_update_of_missing_id_surfaces_not_found() {
        let store = MemoryStore::default();
        let mut candidate = draft_with("soy", Category::Seeds, 5.0);
        candidate.id = Some("gone".to_string());

        let err = save_budget(&store, &candidate).await.unwrap_err();
        match err {
            BudgetError::NotFound(id) => assert_eq!(id, "gone"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_save_failure_propagates() {
        let store = UnavailableStore;
        let draft = draft_with("soy", Category::Seeds, 5.0);
        let err = save_budget(&store, &draft).await.unwrap_err();
        assert!(matches!(err, BudgetError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_save_budgets_concurrent_distinct_triples() {
        let store = MemoryStore::default();
        let records = vec![
            draft_with("soy", Category::Seeds, 1.0),
            draft_with("corn", Category::Seeds, 2.0),
            draft_with("wheat", Category::Seeds, 3.0),
        ];

        let mut ids = save_budgets(&store, &records).await.unwrap();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_budget_map_keys_by_crop() {
        let store = MemoryStore::default();
        save_budget(&store, &draft_with("soy", Category::Seeds, 1.0))
            .await
            .unwrap();
        save_budget(&store, &draft_with("corn", Category::Seeds, 2.0))
            .await
            .unwrap();

        let map = fetch_budget_map(&store, &scope()).await.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["soy"].amounts.get(Category::Seeds), 1.0);
        assert_eq!(map["corn"].amounts.get(Category::Seeds), 2.0);
    }

    #[test]
    fn test_sanitize_strips_absent_fields_and_stamps_updated_at() {
        // An explicit null in stored data deserializes to an absent value;
        // sanitize must not write it back.
        let json = r#"{"companyId":"c1","seasonId":"s1","cropId":"soy",
                       "herbicides":10.0,"fertilizers":null}"#;
        let record: BudgetRecord = serde_json::from_str(json).unwrap();

        let payload = sanitize(&record, Utc::now()).unwrap();
        assert!(payload.contains_key("herbicides"));
        assert!(!payload.contains_key("fertilizers"));
        assert!(!payload.contains_key("id"));
        assert!(payload.contains_key("updatedAt"));
        assert_eq!(payload["companyId"], "c1");
    }

    #[test]
    fn test_merge_creates_draft_with_scope_triple() {
        let merged =
            merge_category_update(None, &scope(), "soy", Category::Herbicides, 12.5).unwrap();
        assert_eq!(merged.id, None);
        assert_eq!(merged.company_id, "c1");
        assert_eq!(merged.season_id, "s1");
        assert_eq!(merged.crop_id, "soy");
        assert_eq!(merged.amounts.get(Category::Herbicides), 12.5);
    }

    #[test]
    fn test_merge_preserves_existing_fields_and_id() {
        let mut existing = draft_with("soy", Category::Herbicides, 10.0);
        existing.id = Some("b1".to_string());

        let merged =
            merge_category_update(Some(&existing), &scope(), "soy", Category::Seeds, 4.0).unwrap();
        assert_eq!(merged.id.as_deref(), Some("b1"));
        assert_eq!(merged.amounts.get(Category::Herbicides), 10.0);
        assert_eq!(merged.amounts.get(Category::Seeds), 4.0);
        // The input record is untouched
        assert_eq!(existing.amounts.raw(Category::Seeds), None);
    }

    #[test]
    fn test_merge_rejects_invalid_values() {
        assert!(merge_category_update(None, &scope(), "soy", Category::Seeds, -1.0).is_err());
        assert!(merge_category_update(None, &scope(), "soy", Category::Seeds, f64::NAN).is_err());
    }
}
