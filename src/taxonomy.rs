use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The twelve spend categories a per-hectare budget is entered against.
///
/// The serialized (camelCase) names double as the field keys used by the
/// document store, so renaming a variant is a data migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Herbicides,
    Insecticides,
    Fungicides,
    Adjuvants,
    OtherAgrochemicals,
    Fertilizers,
    Seeds,
    GroundSpraying,
    SelectiveSpraying,
    AerialSpraying,
    Planting,
    OtherLabor,
}

/// The four top-level groups the categories roll into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum CategoryGroup {
    Agrochemicals,
    Fertilizers,
    Seeds,
    Labor,
}

impl Category {
    /// All categories, in the canonical entry/display order.
    pub const ALL: [Category; 12] = [
        Category::Herbicides,
        Category::Insecticides,
        Category::Fungicides,
        Category::Adjuvants,
        Category::OtherAgrochemicals,
        Category::Fertilizers,
        Category::Seeds,
        Category::GroundSpraying,
        Category::SelectiveSpraying,
        Category::AerialSpraying,
        Category::Planting,
        Category::OtherLabor,
    ];

    /// The group this category rolls into. Total over all twelve categories;
    /// this mapping is the single authoritative copy for both aggregation and
    /// reporting.
    pub fn group(self) -> CategoryGroup {
        match self {
            Category::Herbicides
            | Category::Insecticides
            | Category::Fungicides
            | Category::Adjuvants
            | Category::OtherAgrochemicals => CategoryGroup::Agrochemicals,
            Category::Fertilizers => CategoryGroup::Fertilizers,
            Category::Seeds => CategoryGroup::Seeds,
            Category::GroundSpraying
            | Category::SelectiveSpraying
            | Category::AerialSpraying
            | Category::Planting
            | Category::OtherLabor => CategoryGroup::Labor,
        }
    }

    /// The document field key for this category (camelCase, matching serde).
    pub fn key(self) -> &'static str {
        match self {
            Category::Herbicides => "herbicides",
            Category::Insecticides => "insecticides",
            Category::Fungicides => "fungicides",
            Category::Adjuvants => "adjuvants",
            Category::OtherAgrochemicals => "otherAgrochemicals",
            Category::Fertilizers => "fertilizers",
            Category::Seeds => "seeds",
            Category::GroundSpraying => "groundSpraying",
            Category::SelectiveSpraying => "selectiveSpraying",
            Category::AerialSpraying => "aerialSpraying",
            Category::Planting => "planting",
            Category::OtherLabor => "otherLabor",
        }
    }
}

impl CategoryGroup {
    /// All groups, in display order.
    pub const ALL: [CategoryGroup; 4] = [
        CategoryGroup::Agrochemicals,
        CategoryGroup::Fertilizers,
        CategoryGroup::Seeds,
        CategoryGroup::Labor,
    ];

    /// The categories belonging to this group, in canonical order.
    pub fn categories(self) -> &'static [Category] {
        match self {
            CategoryGroup::Agrochemicals => &[
                Category::Herbicides,
                Category::Insecticides,
                Category::Fungicides,
                Category::Adjuvants,
                Category::OtherAgrochemicals,
            ],
            CategoryGroup::Fertilizers => &[Category::Fertilizers],
            CategoryGroup::Seeds => &[Category::Seeds],
            CategoryGroup::Labor => &[
                Category::GroundSpraying,
                Category::SelectiveSpraying,
                Category::AerialSpraying,
                Category::Planting,
                Category::OtherLabor,
            ],
        }
    }
}
