#![warn(clippy::all, missing_docs)]

//! Core domain logic for the titlepatch catalog.
//!
//! This crate hosts the identifier helpers, the vendor patch
//! fetcher and parser, the SQLite catalog store and the
//! background scan controller used by the web frontend.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ident;
pub mod models;
pub mod patch;
pub mod scan;
pub mod store;

pub use catalog::Catalog;
pub use config::AppConfig;
pub use error::{CatalogError, CatalogResult};
pub use models::{GameRecord, ScanRange};
pub use patch::{PatchDocument, PatchFetcher, PatchSource};
pub use scan::{ScanManager, ScanProgress, ScanSnapshot, ScanState};
pub use store::CatalogStore;
