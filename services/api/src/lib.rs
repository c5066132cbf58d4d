//! HTTP service behind the sign-up form: turns a confirmed identity plus the
//! company details it typed in into a company, an admin user and the default
//! income/expense categories.

pub mod config;
pub mod error;
pub mod identity;
pub mod registration;
pub mod routes;
pub mod store;

pub use config::{Config, StoreBackend};
pub use routes::{build_router, AppState};
