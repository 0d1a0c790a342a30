//! Cost Model
//!
//! Pure monthly cost estimates for an email configuration at a given volume.

mod estimate;
mod pricing;

pub use estimate::{
    estimate, estimate_storage_size, estimate_with, format_cost, FeatureCost,
    FeatureCostBreakdown, TotalCost,
};
pub use pricing::*;
