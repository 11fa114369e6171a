//! Shared application state

use std::sync::Arc;

use dreamlog_core::{
    Clock, ConversationService, InterpretationPipeline, RateLimitConfig, RateLimitStore,
    RateLimiterHost, Storage, SummaryEngine, TextGenerator,
};

/// Shared application state for all routes
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub limiter: Arc<RateLimiterHost>,
    pub summaries: Arc<SummaryEngine>,
    pub conversations: Arc<ConversationService>,
    pub interpreter: Arc<InterpretationPipeline>,
}

impl AppState {
    /// Wire every service over one store and one generator.
    ///
    /// Rate limiter state is persisted in the same database.
    pub fn new(
        storage: Arc<Storage>,
        generator: Arc<dyn TextGenerator>,
        rate_limit: RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store: Arc<dyn RateLimitStore> = storage.clone();
        let limiter = Arc::new(RateLimiterHost::new(store, clock, rate_limit));
        let summaries = Arc::new(SummaryEngine::new(storage.clone(), generator.clone()));
        let conversations = Arc::new(ConversationService::new(
            storage.clone(),
            summaries.clone(),
            generator.clone(),
        ));
        let interpreter = Arc::new(InterpretationPipeline::new(generator));

        Self {
            storage,
            limiter,
            summaries,
            conversations,
            interpreter,
        }
    }
}
