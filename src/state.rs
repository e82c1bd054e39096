use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<[String]>,
}

impl AppState {
    pub fn new(stats: Vec<String>) -> Self {
        Self {
            stats: stats.into(),
        }
    }
}
