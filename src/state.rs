use crate::{
    services::{AccountService, CatalogService},
    store::RecordStore,
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub accounts: AccountService,
}

impl AppState {
    pub fn new(store: RecordStore) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            accounts: AccountService::new(store),
        }
    }
}
