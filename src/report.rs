use crate::aggregator::{roll_up, AggregatedBudget, GroupTotals};
use crate::taxonomy::CategoryGroup;
use crate::ScopeContext;
use serde::{Deserialize, Serialize};

/// What the report wizard hands over: the company being reported on and the
/// fields the user ticked. The core carries the selection through untouched;
/// filtering spend by field happens upstream when the caller builds the
/// spend snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSelection {
    pub company_id: String,
    pub field_ids: Vec<String>,
}

/// Presentation-free health classification matching the gauge color bands:
/// warning above 85% executed, exceeded at 100% or when over budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BudgetHealth {
    OnTrack,
    Warning,
    Exceeded,
}

impl BudgetHealth {
    pub fn classify(aggregate: &AggregatedBudget) -> Self {
        if aggregate.over_budget || aggregate.percent_executed >= 100.0 {
            BudgetHealth::Exceeded
        } else if aggregate.percent_executed > 85.0 {
            BudgetHealth::Warning
        } else {
            BudgetHealth::OnTrack
        }
    }
}

/// Share of total spend per group, in percent. All zeros when nothing was
/// spent. This is the stacked-distribution figure, distinct from the
/// percentage-executed metric.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpendDistribution {
    pub agrochemicals: f64,
    pub fertilizers: f64,
    pub seeds: f64,
    pub labor: f64,
}

impl SpendDistribution {
    pub fn of(spent: &GroupTotals) -> Self {
        let total = spent.total();
        if total <= 0.0 {
            return Self::default();
        }
        Self {
            agrochemicals: spent.agrochemicals / total * 100.0,
            fertilizers: spent.fertilizers / total * 100.0,
            seeds: spent.seeds / total * 100.0,
            labor: spent.labor / total * 100.0,
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
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropReportRow {
    pub crop_id: String,
    pub health: BudgetHealth,
    pub aggregate: AggregatedBudget,
}

/// The data payload handed to report rendering: per-crop rows plus the
/// rolled-up scope total. Numbers and flags only; currency formatting and
/// chart drawing stay with the consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetReport {
    pub scope: ScopeContext,
    pub selection: ReportSelection,
    pub crops: Vec<CropReportRow>,
    pub totals: AggregatedBudget,
    pub totals_health: BudgetHealth,
    pub distribution: SpendDistribution,
}

impl BudgetReport {
    /// Assembles the report payload from per-crop aggregates, preserving
    /// their order.
    pub fn assemble(
        scope: ScopeContext,
        selection: ReportSelection,
        aggregates: &[AggregatedBudget],
    ) -> Self {
        let crops = aggregates
            .iter()
            .map(|aggregate| CropReportRow {
                crop_id: aggregate.crop_id.clone().unwrap_or_default(),
                health: BudgetHealth::classify(aggregate),
                aggregate: aggregate.clone(),
            })
            .collect();

        let totals = roll_up(aggregates);
        let totals_health = BudgetHealth::classify(&totals);
        let distribution = SpendDistribution::of(&totals.spent);

        Self {
            scope,
            selection,
            crops,
            totals,
            totals_health,
            distribution,
        }
    }

    /// Plain CSV rendering of the per-crop table plus a totals row. Two
    /// decimal places here are a file-format choice; the in-memory payload
    /// keeps full precision.
    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str(
            "Crop,Budget Agrochemicals,Budget Fertilizers,Budget Seeds,Budget Labor,Budget Total,\
             Spent Agrochemicals,Spent Fertilizers,Spent Seeds,Spent Labor,Spent Total,\
             Percent Executed,Remaining,Over Budget\n",
        );

        for row in &self.crops {
            output.push_str(&Self::csv_line(&row.crop_id, &row.aggregate));
        }
        output.push_str(&Self::csv_line("TOTAL", &self.totals));

        output
    }

    fn csv_line(label: &str, a: &AggregatedBudget) -> String {
        format!(
            "{},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{}\n",
            label,
            a.budget.agrochemicals,
            a.budget.fertilizers,
            a.budget.seeds,
            a.budget.labor,
            a.total_budget,
            a.spent.agrochemicals,
            a.spent.fertilizers,
            a.spent.seeds,
            a.spent.labor,
            a.total_spent,
            a.percent_executed,
            a.remaining,
            a.over_budget
        )
    }
}
