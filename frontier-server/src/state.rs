use frontier_core::catalog::CatalogRegistry;
use frontier_core::sim_clock::SimClock;
use frontier_store::DbModelManager;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub mm: DbModelManager,
    pub clock: Arc<SimClock>,
    pub registry: Arc<CatalogRegistry>,
    pub dev_skip_auth: bool,
}
