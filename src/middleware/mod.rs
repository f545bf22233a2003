//! Request middleware.

pub mod tenancy;

pub use tenancy::{ResolvedTenant, tenancy_preprocessor};
