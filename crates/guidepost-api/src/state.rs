use std::sync::Arc;

use guidepost_db::Database;
use guidepost_gateway::lifecycle::LifecycleManager;
use guidepost_gateway::registry::Registry;
use guidepost_gateway::router::LiveRouter;

use crate::service::ConversationService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub conversations: ConversationService,
    pub lifecycle: LifecycleManager,
}

impl AppStateInner {
    /// Wire the registry, router, lifecycle and conversation service around
    /// one database. The registry is shared by the router and the lifecycle.
    pub fn build(db: Arc<Database>, echo_to_sender: bool) -> AppState {
        let registry = Registry::new();
        let router = Arc::new(LiveRouter::new(registry.clone(), echo_to_sender));
        let conversations = ConversationService::new(db.clone(), db.clone(), router);

        Arc::new(Self {
            db,
            conversations,
            lifecycle: LifecycleManager::new(registry),
        })
    }
}
