use crate::error::Result;
use crate::schema::{BudgetRecord, CategoryAmounts, SpendByCrop};
use crate::taxonomy::CategoryGroup;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sum of the category values in `amounts` belonging to `group`, with absent
/// values read as zero and negative values floored to zero. Validation at the
/// aggregate boundary rejects negatives outright; the floor here guarantees a
/// subtotal can never go negative even for unvalidated input.
pub fn sum_group(amounts: &CategoryAmounts, group: CategoryGroup) -> f64 {
    group
        .categories()
        .iter()
        .map(|category| amounts.get(*category).max(0.0))
        .sum()
}

/// Sum of all four group sums.
pub fn total_of(amounts: &CategoryAmounts) -> f64 {
    CategoryGroup::ALL
        .iter()
        .map(|group| sum_group(amounts, *group))
        .sum()
}

/// Percentage executed, capped at 100.
///
/// When no real budget exists (`budget <= 0`) the denominator falls back to
/// `spent` itself, and 0/0 resolves to the sentinel 100. Both fallbacks are a
/// presentation compromise to keep gauges rendering without a division by
/// zero, not a financial statement.
pub fn percentage(spent: f64, budget: f64) -> f64 {
    if budget > 0.0 {
        (spent / budget).min(1.0) * 100.0
    } else {
        // spent / spent caps at 100 for any positive spend; 0/0 takes the
        // sentinel. Either way the answer is 100.
        100.0
    }
}

/// Strict over-budget check. With amounts floored at zero this covers both
/// rules the hierarchy needs: a positive budget exceeded, and a zero budget
/// with any positive spend. Budget `<= 0` never flags on zero spend.
pub fn is_over_budget(spent: f64, budget: f64) -> bool {
    spent > budget.max(0.0)
}

/// Per-group subtotals for one side (budget or actual spend) of a scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupTotals {
    pub agrochemicals: f64,
    pub fertilizers: f64,
    pub seeds: f64,
    pub labor: f64,
}

impl GroupTotals {
    pub fn of(amounts: &CategoryAmounts) -> Self {
        Self {
            agrochemicals: sum_group(amounts, CategoryGroup::Agrochemicals),
            fertilizers: sum_group(amounts, CategoryGroup::Fertilizers),
            seeds: sum_group(amounts, CategoryGroup::Seeds),
            labor: sum_group(amounts, CategoryGroup::Labor),
        }
    }

    pub fn get(&self, group: CategoryGroup) -> f64 {
        match group {
            CategoryGroup::Agrochemicals => self.agrochemicals,
            CategoryGroup::Fertilizers => self.fertilizers,
            CategoryGroup::Seeds => self.seeds,
            CategoryGroup::Labor => self.labor,
        }
    }

    pub fn total(&self) -> f64 {
        self.agrochemicals + self.fertilizers + self.seeds + self.labor
    }

    fn add(&mut self, other: &GroupTotals) {
        self.agrochemicals += other.agrochemicals;
        self.fertilizers += other.fertilizers;
        self.seeds += other.seeds;
        self.labor += other.labor;
    }
}

/// Derived budget-versus-spend metrics for one crop, or for a rolled-up scope
/// (`crop_id` is `None` then). Recomputed on every read, never persisted.
/// All amounts keep full floating-point precision; rounding is left to the
/// presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedBudget {
    pub crop_id: Option<String>,
    pub budget: GroupTotals,
    pub spent: GroupTotals,
    pub total_budget: f64,
    pub total_spent: f64,
    pub percent_executed: f64,
    pub remaining: f64,
    pub over_budget: bool,
}

impl AggregatedBudget {
    fn from_totals(crop_id: Option<String>, budget: GroupTotals, spent: GroupTotals) -> Self {
        let total_budget = budget.total();
        let total_spent = spent.total();
        Self {
            crop_id,
            budget,
            spent,
            total_budget,
            total_spent,
            percent_executed: percentage(total_spent, total_budget),
            remaining: (total_budget - total_spent).max(0.0),
            over_budget: is_over_budget(total_spent, total_budget),
        }
    }

    /// Finer-grained over-budget check at the group level. A crop can stay
    /// under its grand total while a single group is already exceeded.
    pub fn group_over_budget(&self, group: CategoryGroup) -> bool {
        is_over_budget(self.spent.get(group), self.budget.get(group))
    }

    pub fn over_budget_groups(&self) -> Vec<CategoryGroup> {
        CategoryGroup::ALL
            .iter()
            .copied()
            .filter(|group| self.group_over_budget(*group))
            .collect()
    }
}

/// Computes one `AggregatedBudget` per crop by zipping budget records against
/// actual spend on crop id.
///
/// Output order follows `crop_order` (the caller's canonical crop list).
/// Crops that appear only in `records` or `spend` are appended afterwards in
/// lexicographic order so no data is silently dropped; a crop with spend but
/// no record gets an implicit zero budget.
pub fn aggregate(
    crop_order: &[String],
    records: &[BudgetRecord],
    spend: &SpendByCrop,
) -> Result<Vec<AggregatedBudget>> {
    let mut by_crop: BTreeMap<&str, &BudgetRecord> = BTreeMap::new();
    for record in records {
        record.amounts.validate(&record.crop_id)?;
        if by_crop.insert(record.crop_id.as_str(), record).is_some() {
            debug!(
                "Multiple budget records passed for crop {}; keeping the last",
                record.crop_id
            );
        }
    }
    for (crop_id, amounts) in spend {
        amounts.validate(crop_id)?;
    }

    let mut ordered: Vec<&str> = crop_order.iter().map(String::as_str).collect();
    let mut extras: Vec<&str> = by_crop
        .keys()
        .copied()
        .chain(spend.keys().map(String::as_str))
        .filter(|crop_id| !crop_order.iter().any(|c| c == crop_id))
        .collect();
    extras.sort_unstable();
    extras.dedup();
    ordered.extend(extras);

    let zero = CategoryAmounts::default();
    let aggregates = ordered
        .iter()
        .map(|crop_id| {
            let budget_amounts = by_crop.get(crop_id).map(|r| &r.amounts).unwrap_or(&zero);
            let spend_amounts = spend.get(*crop_id).unwrap_or(&zero);
            AggregatedBudget::from_totals(
                Some(crop_id.to_string()),
                GroupTotals::of(budget_amounts),
                GroupTotals::of(spend_amounts),
            )
        })
        .collect();

    Ok(aggregates)
}

/// Sums per-crop aggregates into a single scope-level aggregate. Derived
/// metrics are recomputed from the summed totals, never averaged, which makes
/// the operation associative and commutative over any crop partition.
pub fn roll_up(aggregates: &[AggregatedBudget]) -> AggregatedBudget {
    let mut budget = GroupTotals::default();
    let mut spent = GroupTotals::default();
    for aggregate in aggregates {
        budget.add(&aggregate.budget);
        spent.add(&aggregate.spent);
    }
    AggregatedBudget::from_totals(None, budget, spent)
}
