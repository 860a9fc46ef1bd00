//! Gostwear storefront backend.
//!
//! Products and users live in flat JSON collections managed by [`store::RecordStore`];
//! the axum router in [`app`] exposes them over HTTP.

pub mod app;
pub mod config;
pub mod cors;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;
pub mod store;

pub use app::build_router;
pub use store::{Record, RecordId, RecordStore, StoreError, StoreResult};
