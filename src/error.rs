use thiserror::Error;

#[derive(Error, Debug)]
pub enum BudgetError {
    #[error("Invalid {category} value for crop {crop_id}: {details}")]
    Validation {
        crop_id: String,
        category: String,
        details: String,
    },

    #[error("Duplicate allocations for company {company_id}, season {season_id}, crop {crop_id}: found {count} records")]
    DuplicateAllocation {
        company_id: String,
        season_id: String,
        crop_id: String,
        count: usize,
    },

    #[error("Budget store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("No budget record with id {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BudgetError>;
