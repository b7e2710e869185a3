use crate::error::{BudgetError, Result};
use crate::taxonomy::Category;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-category currency-per-hectare amounts. A `None` field means the value
/// was never entered and is treated as zero by the aggregator, while the
/// document store keeps the field absent entirely (it distinguishes "absent"
/// from "present with value").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAmounts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Herbicide spend rate in currency per hectare")]
    pub herbicides: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Insecticide spend rate in currency per hectare")]
    pub insecticides: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Fungicide spend rate in currency per hectare")]
    pub fungicides: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Adjuvant spend rate in currency per hectare")]
    pub adjuvants: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Other agrochemical spend rate in currency per hectare")]
    pub other_agrochemicals: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Fertilizer spend rate in currency per hectare")]
    pub fertilizers: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Seed spend rate in currency per hectare")]
    pub seeds: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Ground spraying labor rate in currency per hectare")]
    pub ground_spraying: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Selective spraying labor rate in currency per hectare")]
    pub selective_spraying: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Aerial spraying labor rate in currency per hectare")]
    pub aerial_spraying: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Planting labor rate in currency per hectare")]
    pub planting: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Other labor rate in currency per hectare")]
    pub other_labor: Option<f64>,
}

impl CategoryAmounts {
    /// The effective amount for a category, with an absent value read as zero.
    pub fn get(&self, category: Category) -> f64 {
        self.raw(category).unwrap_or(0.0)
    }

    /// The stored value for a category, `None` if never entered.
    pub fn raw(&self, category: Category) -> Option<f64> {
        match category {
            Category::Herbicides => self.herbicides,
            Category::Insecticides => self.insecticides,
            Category::Fungicides => self.fungicides,
            Category::Adjuvants => self.adjuvants,
            Category::OtherAgrochemicals => self.other_agrochemicals,
            Category::Fertilizers => self.fertilizers,
            Category::Seeds => self.seeds,
            Category::GroundSpraying => self.ground_spraying,
            Category::SelectiveSpraying => self.selective_spraying,
            Category::AerialSpraying => self.aerial_spraying,
            Category::Planting => self.planting,
            Category::OtherLabor => self.other_labor,
        }
    }

    pub fn set(&mut self, category: Category, value: f64) {
        let slot = match category {
            Category::Herbicides => &mut self.herbicides,
            Category::Insecticides => &mut self.insecticides,
            Category::Fungicides => &mut self.fungicides,
            Category::Adjuvants => &mut self.adjuvants,
            Category::OtherAgrochemicals => &mut self.other_agrochemicals,
            Category::Fertilizers => &mut self.fertilizers,
            Category::Seeds => &mut self.seeds,
            Category::GroundSpraying => &mut self.ground_spraying,
            Category::SelectiveSpraying => &mut self.selective_spraying,
            Category::AerialSpraying => &mut self.aerial_spraying,
            Category::Planting => &mut self.planting,
            Category::OtherLabor => &mut self.other_labor,
        };
        *slot = Some(value);
    }

    /// Rejects non-finite or negative amounts. Negative budgets are not
    /// meaningful; the decision here is to reject rather than silently floor,
    /// so callers learn about bad input. The pure summing helpers in the
    /// aggregator still floor at zero as a second line.
    pub fn validate(&self, crop_id: &str) -> Result<()> {
        for category in Category::ALL {
            if let Some(value) = self.raw(category) {
                if !value.is_finite() {
                    return Err(BudgetError::Validation {
                        crop_id: crop_id.to_string(),
                        category: category.key().to_string(),
                        details: format!("value {} is not a finite number", value),
                    });
                }
                if value < 0.0 {
                    return Err(BudgetError::Validation {
                        crop_id: crop_id.to_string(),
                        category: category.key().to_string(),
                        details: format!("value {} is negative", value),
                    });
                }
            }
        }
        Ok(())
    }
}

/// One per-crop budget allocation inside a (company, season) scope.
///
/// At most one persisted record exists per (company, season, crop) triple;
/// the reconciler enforces that on every save. `id` is `None` until the
/// store assigns one.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Store-assigned document id. Absent for unsaved drafts.")]
    pub id: Option<String>,

    #[schemars(description = "Owning company id")]
    pub company_id: String,

    #[schemars(description = "Season id the allocation applies to")]
    pub season_id: String,

    #[schemars(description = "Crop id the allocation applies to")]
    pub crop_id: String,

    #[serde(flatten)]
    pub amounts: CategoryAmounts,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Creation timestamp, stamped by the reconciler on first save")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Last-update timestamp, stamped by the reconciler on every save")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BudgetRecord {
    /// An empty draft for a crop that has no persisted allocation yet.
    pub fn draft(company_id: &str, season_id: &str, crop_id: &str) -> Self {
        Self {
            id: None,
            company_id: company_id.to_string(),
            season_id: season_id.to_string(),
            crop_id: crop_id.to_string(),
            amounts: CategoryAmounts::default(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Whether this record has been persisted (carries a store id).
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(BudgetRecord)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Actual recorded spend per crop, already reduced to per-category totals by
/// the caller. The aggregator zips this against the budget records by crop id.
pub type SpendByCrop = BTreeMap<String, CategoryAmounts>;
