use std::sync::Arc;

use dog_content::ContentBinder;

#[derive(Clone)]
pub struct ContentState {
    pub binder: Arc<ContentBinder>,
}

impl ContentState {
    pub fn new(binder: ContentBinder) -> Self {
        Self {
            binder: Arc::new(binder),
        }
    }
}
