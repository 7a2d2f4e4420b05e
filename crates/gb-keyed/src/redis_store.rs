use super::store::KeyedStore;
use super::store::StoreError;
use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::unbounded_channel;

/// Compare-and-delete as a single atomic script. GET/DEL as separate
/// commands would let a stale holder delete a lock it no longer owns.
const COMPARE_AND_DELETE: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
"#;

/// Redis-backed keyed store.
///
/// Operations go through a multiplexed [`redis::aio::ConnectionManager`]
/// which reconnects internally; subscriptions take a dedicated pub/sub
/// connection per channel.
pub struct RedisStore {
    client: redis::Client,
    conn: redis::aio::ConnectionManager,
    cad: redis::Script,
}

impl RedisStore {
    /// Connects to Redis at `url` (e.g. `redis://127.0.0.1/`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        log::info!("connecting to keyed store");
        let client = redis::Client::open(url).map_err(StoreError::from)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(StoreError::from)?;
        Ok(Self {
            client,
            conn,
            cad: redis::Script::new(COMPARE_AND_DELETE),
        })
    }
    fn conn(&self) -> redis::aio::ConnectionManager {
        self.conn.clone()
    }
    fn secs(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

#[async_trait]
impl KeyedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.set_ex(key, value, Self::secs(ttl)).await?;
        Ok(())
    }
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(Self::secs(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }
    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.del(key).await?;
        Ok(())
    }
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let deleted: i32 = self
            .cad
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted == 1)
    }
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        let mut found = Vec::new();
        let mut iter: redis::AsyncIter<String> = conn.scan_match(pattern).await?;
        while let Some(key) = iter.next_item().await {
            found.push(key);
        }
        Ok(found)
    }
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: bool = conn.expire(key, Self::secs(ttl) as i64).await?;
        Ok(())
    }
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn();
        let value: Option<String> = conn.hget(key, field).await?;
        Ok(value)
    }
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }
    async fn hdel(&self, key: &str, field: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.hdel(key, field).await?;
        Ok(())
    }
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.publish(channel, payload).await?;
        Ok(())
    }
    async fn subscribe(&self, channel: &str) -> Result<UnboundedReceiver<String>, StoreError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        let (tx, rx) = unbounded_channel();
        let name = channel.to_string();
        tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                match msg.get_payload::<String>() {
                    Ok(payload) => {
                        if tx.send(payload).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::warn!("[pubsub {}] bad payload: {}", name, e),
                }
            }
            log::warn!("[pubsub {}] subscription closed", name);
        });
        Ok(rx)
    }
}
