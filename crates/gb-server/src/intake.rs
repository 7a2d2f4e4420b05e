use gb_keyed::KeyedStore;
use gb_keyed::StoreError;
use gb_router::COMMAND_CHANNEL;
use gb_router::IncomingCommand;
use gb_router::RoomSerializer;
use std::sync::Arc;

/// Feeds cluster-delivered commands into the per-room serializer.
///
/// Commands are not processed inline; they enter the room's FIFO queue so
/// ordering holds per room across replicas. Runs until the subscription
/// closes.
pub async fn intake(
    store: Arc<dyn KeyedStore>,
    serializer: Arc<RoomSerializer>,
) -> Result<(), StoreError> {
    let mut rx = store.subscribe(COMMAND_CHANNEL).await?;
    log::info!("[intake] listening on {}", COMMAND_CHANNEL);
    while let Some(payload) = rx.recv().await {
        match serde_json::from_str::<IncomingCommand>(&payload) {
            Ok(command) => serializer.submit(command),
            Err(e) => log::warn!("[intake] bad command payload: {}", e),
        }
    }
    log::warn!("[intake] command subscription closed");
    Ok(())
}
