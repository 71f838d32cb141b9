//! # Beacon
//!
//! Backend for a hosted code workspace product: multi-tenant workspaces
//! with plans, projects, files, members, and a subscription lifecycle.
//! Usable both as a standalone binary and as a library.
//!
//! The interesting parts live in [`core`]: the quota ledger, the
//! membership limiter, the identity upsert, generation-token conflict
//! detection, the workspace lifecycle machine, the billing event
//! processor, and the reconciliation/purge jobs.

pub mod auth;
pub mod config;
pub mod core;
pub mod error;
pub mod server;
pub mod storage;
pub mod store;
pub mod types;
