//! # Catalog Lookup
//!
//! Read-only resolution of products and clients for the sale manager.
//!
//! The manager depends on the [`CatalogLookup`] trait, not on SQLite, so a
//! test can hand it a fixed catalog. [`SqliteCatalog`] is the production
//! implementation on top of the repositories.

use async_trait::async_trait;

use crate::error::DbResult;
use crate::repository::client::ClientRepository;
use crate::repository::product::ProductRepository;
use forneria_core::{Client, Product};

/// Looks up catalog records by reference.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Resolves a product by id, falling back to its code.
    async fn product_by_id_or_code(&self, reference: &str) -> DbResult<Option<Product>>;

    async fn client(&self, id: &str) -> DbResult<Option<Client>>;
}

/// [`CatalogLookup`] backed by the SQLite repositories.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    products: ProductRepository,
    clients: ClientRepository,
}

impl SqliteCatalog {
    pub fn new(products: ProductRepository, clients: ClientRepository) -> Self {
        SqliteCatalog { products, clients }
    }
}

#[async_trait]
impl CatalogLookup for SqliteCatalog {
    async fn product_by_id_or_code(&self, reference: &str) -> DbResult<Option<Product>> {
        self.products.get_by_ref(reference).await
    }

    async fn client(&self, id: &str) -> DbResult<Option<Client>> {
        self.clients.get_by_id(id).await
    }
}
