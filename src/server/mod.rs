mod admin;
mod billing;
pub mod dto;
mod files;
mod identity;
mod projects;
pub mod response;
mod router;
mod workspaces;

pub use router::{AppState, create_router};
