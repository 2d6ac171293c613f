//! Vendor patch metadata: fetching and parsing.

pub mod document;
pub mod fetch;

pub use document::{PatchDocument, PatchPackage, PatchTag};
pub use fetch::{PatchFetcher, PatchSource};
