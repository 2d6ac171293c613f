//! Lookup and search operations combining the vendor source with the store.

use tracing::{info, warn};

use crate::{
    error::CatalogResult,
    ident,
    models::GameRecord,
    patch::{PatchDocument, PatchSource},
    store::CatalogStore,
};

/// Catalog service over a patch source and a store.
pub struct Catalog<S> {
    source: S,
    store: CatalogStore,
}

impl<S: PatchSource> Catalog<S> {
    /// Create a catalog from its collaborators.
    pub fn new(source: S, store: CatalogStore) -> Self {
        Self { source, store }
    }

    /// Underlying patch source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Underlying store.
    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Fetch and parse the patch document for `code` without persisting it.
    pub async fn resolve(&self, code: &str) -> CatalogResult<PatchDocument> {
        ident::validate_code(code)?;
        let raw = self.source.fetch(code).await?;
        PatchDocument::parse(&raw)
    }

    /// Resolve `code` and remember its title.
    ///
    /// Storage failures are logged and do not fail the lookup.
    pub async fn lookup(&self, code: &str) -> CatalogResult<PatchDocument> {
        let document = self.resolve(code).await?;
        if let Err(err) = self.remember(code, &document) {
            warn!(%code, ?err, "failed to store title");
        }
        Ok(document)
    }

    /// Store the title carried by `document` under `code`, keeping any existing record.
    pub fn remember(&self, code: &str, document: &PatchDocument) -> CatalogResult<(GameRecord, bool)> {
        let title = document.title()?;
        let (record, created) = self.store.find_or_create(code, title, &document.alias()?)?;
        if created {
            info!(code = %record.code, title = %record.title, "title stored");
        }
        Ok((record, created))
    }

    /// Records whose title contains `fragment`, case-insensitively.
    pub fn search_by_title(&self, fragment: &str) -> CatalogResult<Vec<GameRecord>> {
        self.store.find_by_title_fragment(fragment)
    }

    /// Record for a free-form identifier query, normalised to uppercase.
    pub fn search_by_code(&self, input: &str) -> CatalogResult<Option<GameRecord>> {
        self.store.find_by_code(&ident::normalize_code(input))
    }

    /// Every known record, ordered by title.
    pub fn list(&self) -> CatalogResult<Vec<GameRecord>> {
        self.store.list_all()
    }
}
