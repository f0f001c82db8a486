//! Route handlers organized by resource

pub mod auth;
pub mod data_sources;
pub mod execute;
pub mod health;
pub mod reports;
