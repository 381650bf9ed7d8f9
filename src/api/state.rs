use std::sync::Arc;

use crate::store::{IndexStore, RecordStore};
use crate::sync::SyncEngine;

#[derive(Clone)]
pub struct AppState {
    pub records: Arc<dyn RecordStore>,
    pub index: Arc<dyn IndexStore>,
    pub engine: Arc<SyncEngine>,
}

impl AppState {
    pub fn new(records: Arc<dyn RecordStore>, index: Arc<dyn IndexStore>, engine: Arc<SyncEngine>) -> Self {
        Self {
            records,
            index,
            engine,
        }
    }
}
