// Application state module
// Immutable state shared by every connection

use super::types::Config;
use crate::store::ResultStore;

/// Application state
///
/// Built once at startup and shared behind an `Arc`; nothing in here is
/// mutated while serving.
pub struct AppState<E> {
    pub config: Config,
    pub store: ResultStore,
    pub executor: E,
}

impl<E> AppState<E> {
    pub fn new(config: Config, executor: E) -> Self {
        let store = ResultStore::new(&config.storage.data_path);
        Self {
            config,
            store,
            executor,
        }
    }
}
