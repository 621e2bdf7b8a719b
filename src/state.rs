use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    authoring::DraftRegistry,
    config::Config,
    session::SessionRegistry,
    store::Store,
    upload::UploadPipeline,
    utils::jwt::RevokedTokens,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub sessions: SessionRegistry,
    pub drafts: DraftRegistry,
    pub uploads: UploadPipeline,
    pub revoked: RevokedTokens,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config, uploads: UploadPipeline) -> Self {
        Self {
            sessions: SessionRegistry::new(store.clone()),
            drafts: DraftRegistry::new(),
            revoked: RevokedTokens::default(),
            store,
            config,
            uploads,
        }
    }
}

impl FromRef<AppState> for Arc<dyn Store> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
