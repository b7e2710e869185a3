//! # Crop Budget Engine
//!
//! A library for tracking agricultural input spending against per-crop
//! budgets and rolling the figures up for reports. Budgets are entered as
//! currency-per-hectare rates across twelve spend categories; the engine
//! reconciles them against actual recorded spend and produces the derived
//! metrics (percentage executed, remaining, over-budget flags) that gauges,
//! tables and exported reports consume.
//!
//! ## Core Concepts
//!
//! - **Allocation**: one [`BudgetRecord`] per (company, season, crop) triple,
//!   unique per triple — the reconciler enforces that on every save.
//! - **Taxonomy**: twelve fixed categories rolling into four groups
//!   (agrochemicals, fertilizers, seeds, labor), defined once in
//!   [`taxonomy`] and authoritative for both aggregation and reporting.
//! - **Aggregation**: pure, synchronous math over snapshots. The aggregator
//!   performs no I/O and keeps full floating-point precision; rounding is a
//!   presentation concern.
//! - **Reconciliation**: the save path resolves create-versus-update by id
//!   or by triple query, sanitizes the payload, and writes once through the
//!   [`BudgetStore`] adapter.
//!
//! ## Example
//!
//! ```rust,ignore
//! use crop_budget_engine::*;
//!
//! let scope = ScopeContext::new("company-1", "season-2025");
//! let records = store.fetch_budgets(&scope.company_id, &scope.season_id).await?;
//! let result = process_budget_scope(&crop_order, &records, &spend)?;
//!
//! println!("{}% executed", result.totals.percent_executed);
//! ```

pub mod aggregator;
pub mod error;
pub mod reconciler;
pub mod report;
pub mod schema;
pub mod taxonomy;

pub use aggregator::{
    aggregate, is_over_budget, percentage, roll_up, sum_group, total_of, AggregatedBudget,
    GroupTotals,
};
pub use error::{BudgetError, Result};
pub use reconciler::{
    fetch_budget_map, merge_category_update, resolve_save_target, sanitize, save_budget,
    save_budgets, BudgetStore, Document, SaveTarget,
};
pub use report::{BudgetHealth, BudgetReport, CropReportRow, ReportSelection, SpendDistribution};
pub use schema::{BudgetRecord, CategoryAmounts, SpendByCrop};
pub use taxonomy::{Category, CategoryGroup};

use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The (company, season) scope every read and write is explicit about.
/// Passed through calls instead of living in ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScopeContext {
    pub company_id: String,
    pub season_id: String,
}

impl ScopeContext {
    pub fn new(company_id: &str, season_id: &str) -> Self {
        Self {
            company_id: company_id.to_string(),
            season_id: season_id.to_string(),
        }
    }
}

/// Per-crop aggregates plus the rolled-up scope total, the shape consumed by
/// dashboards and the report assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeAggregation {
    pub crops: Vec<AggregatedBudget>,
    pub totals: AggregatedBudget,
}

pub struct BudgetProcessor;

impl BudgetProcessor {
    /// Validates, aggregates and rolls up one scope's records against actual
    /// spend. Pure and synchronous; safe to call from concurrent tasks.
    pub fn process(
        crop_order: &[String],
        records: &[BudgetRecord],
        spend: &SpendByCrop,
    ) -> Result<ScopeAggregation> {
        debug!(
            "Aggregating {} budget records against spend for {} crops",
            records.len(),
            spend.len()
        );

        let crops = aggregate(crop_order, records, spend)?;
        let totals = roll_up(&crops);

        info!(
            "Scope aggregation complete: {} crops, budget {:.2}, spent {:.2}",
            crops.len(),
            totals.total_budget,
            totals.total_spent
        );

        Ok(ScopeAggregation { crops, totals })
    }
}

pub fn process_budget_scope(
    crop_order: &[String],
    records: &[BudgetRecord],
    spend: &SpendByCrop,
) -> Result<ScopeAggregation> {
    BudgetProcessor::process(crop_order, records, spend)
}

/// Fetches a scope's records through the store adapter and aggregates them
/// in one step. The spend snapshot is still supplied by the caller, which
/// owns how actual spend is collected and filtered.
pub async fn fetch_and_process<S: BudgetStore>(
    store: &S,
    scope: &ScopeContext,
    crop_order: &[String],
    spend: &SpendByCrop,
) -> Result<ScopeAggregation> {
    let records = store
        .fetch_budgets(&scope.company_id, &scope.season_id)
        .await?;
    BudgetProcessor::process(crop_order, &records, spend)
}
