//! HTTP handlers grouped by resource

pub mod auth;
pub mod batches;
pub mod events;
pub mod mockchain;
