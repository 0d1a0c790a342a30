//! Email Service Configuration
//!
//! Feature configuration, presets and advisory validation for the email
//! service. Pure data; persisted by the metadata store and consumed by the
//! cost model and the deployment orchestrator.

mod config;
mod presets;
mod validation;

pub use config::*;
pub use presets::EmailPreset;
pub use validation::{validate, ConfigWarning, DEDICATED_IP_MIN_MONTHLY_VOLUME};
