use axum::extract::FromRef;

use crate::record_store::RecordStore;
use std::sync::Arc;
use std::time::Instant;

use super::auth::{Authenticator, SessionStore};
use super::images::ImageStore;
use super::ServerConfig;

pub type GuardedRecordStore = Arc<dyn RecordStore>;
pub type GuardedAuthenticator = Arc<dyn Authenticator>;
pub type GuardedSessionStore = Arc<SessionStore>;
pub type GuardedImageStore = Arc<ImageStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub record_store: GuardedRecordStore,
    pub authenticator: GuardedAuthenticator,
    pub sessions: GuardedSessionStore,
    pub image_store: GuardedImageStore,
}

impl FromRef<ServerState> for GuardedRecordStore {
    fn from_ref(input: &ServerState) -> Self {
        input.record_store.clone()
    }
}

impl FromRef<ServerState> for GuardedAuthenticator {
    fn from_ref(input: &ServerState) -> Self {
        input.authenticator.clone()
    }
}

impl FromRef<ServerState> for GuardedSessionStore {
    fn from_ref(input: &ServerState) -> Self {
        input.sessions.clone()
    }
}

impl FromRef<ServerState> for GuardedImageStore {
    fn from_ref(input: &ServerState) -> Self {
        input.image_store.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
