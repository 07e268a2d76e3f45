//! Client wiring: builds the storage, identity and realtime adapters and
//! hands them to the interactive session.

use std::sync::Arc;

use bossbattle_shared::time::SystemClock;

use crate::{
    domain::KeyValueStorage,
    infrastructure::{
        identity::{SessionIdentity, StoredGuestTokenProvider},
        storage::FileStorage,
        transport::WebSocketConnector,
    },
    usecase::{JoinStateStore, RealtimeConnectionHandle},
};

use super::{
    config::ClientConfig,
    error::ClientError,
    session::{Session, run_client_session},
};

/// Run the interactive client
pub async fn run_client(config: ClientConfig) -> Result<(), ClientError> {
    tracing::info!(
        "Using storage at {} (polling every {:?})",
        config.storage_dir.display(),
        config.poll_interval
    );

    let storage: Arc<dyn KeyValueStorage> =
        Arc::new(FileStorage::open(&config.storage_dir, config.poll_interval).await?);
    let identity = Arc::new(SessionIdentity::new(config.user_token.clone()));
    let guest = Arc::new(StoredGuestTokenProvider::new(storage.clone()));

    let store = JoinStateStore::start(storage, identity.clone(), guest).await;
    tracing::info!("Playing as '{}'", store.identity().await);

    let connector = Arc::new(WebSocketConnector::new(config.socket_url.clone()));
    let preview = RealtimeConnectionHandle::new(connector, Arc::new(SystemClock))
        .with_credential(config.user_token.clone());
    tracing::info!("Realtime previews connect to {}", config.socket_url);

    run_client_session(Session::new(store, preview, identity)).await
}
