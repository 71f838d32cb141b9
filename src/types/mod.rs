mod billing;
mod models;
mod provider;
mod role;

pub use billing::BillingEvent;
pub use models::*;
pub use provider::{Profile, Provider};
pub use role::Role;
