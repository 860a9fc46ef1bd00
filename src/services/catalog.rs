use crate::{
    error::{AppError, AppResult},
    models::PRODUCTS,
    store::{Record, RecordId, RecordStore},
};

/// Read-only access to the `products` collection.
#[derive(Debug, Clone)]
pub struct CatalogService {
    store: RecordStore,
}

impl CatalogService {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub async fn list_products(&self) -> AppResult<Vec<Record>> {
        let present = self
            .store
            .exists(PRODUCTS)
            .await
            .map_err(|err| AppError::storage("Failed to load products", err))?;
        if !present {
            return Err(AppError::not_found("Products file not found"));
        }

        self.store
            .load_all(PRODUCTS)
            .await
            .map_err(|err| AppError::storage("Failed to load products", err))
    }

    /// Looks a product up by the raw path segment. A text id wins over a
    /// numeric one when both could match.
    pub async fn get_product(&self, raw_id: &str) -> AppResult<Record> {
        let products = self
            .store
            .load_all(PRODUCTS)
            .await
            .map_err(|err| AppError::storage("Error loading product data", err))?;

        RecordId::lookup_candidates(raw_id)
            .iter()
            .find_map(|candidate| products.iter().find(|product| product.id() == candidate))
            .cloned()
            .ok_or_else(|| AppError::not_found("Product not found"))
    }
}
