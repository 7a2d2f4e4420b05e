use super::engine::LowCard;
use super::timer::Phase;
use super::timer::Timers;
use gb_core::POLL_INTERVAL_MS;
use gb_core::now_ms;
use gb_keyed::KeyedStore;
use gb_keyed::StoreError;
use std::sync::Arc;
use std::time::Duration;

/// Background loop that scans timers and drives state transitions when
/// deadlines expire. One per engine instance.
///
/// The poller is the only clock. A second firing of the same transition is
/// a no-op because every handler re-checks the current snapshot under its
/// lock before acting.
pub struct Poller {
    engine: Arc<LowCard>,
    timers: Timers,
}

impl Poller {
    pub fn new(engine: Arc<LowCard>, store: Arc<dyn KeyedStore>) -> Self {
        Self {
            engine,
            timers: Timers::new(store),
        }
    }

    /// Runs forever. Spawn on the runtime at startup.
    pub async fn run(self) {
        log::info!("[poller] timer loop running");
        let mut interval = tokio::time::interval(Duration::from_millis(POLL_INTERVAL_MS));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                log::warn!("[poller] scan failed: {}", e);
            }
        }
    }

    /// One scan over the timer keyspace. Public so tests can drive the
    /// clock by hand.
    pub async fn tick(&self) -> Result<(), StoreError> {
        let now = now_ms();
        for (room, timer) in self.timers.scan().await? {
            if !timer.expired(now) {
                continue;
            }
            log::debug!(
                "[poller] {:?} timer fired for room {} (round {})",
                timer.phase,
                room,
                timer.round_number
            );
            match timer.phase {
                Phase::Join => {
                    self.engine.begin_game(room).await;
                }
                Phase::Countdown => {
                    self.engine.open_round(room).await;
                }
                Phase::Round => {
                    self.engine.auto_draw_for_timeout(room).await;
                    self.engine.tally_round(room, true).await;
                }
            }
        }
        Ok(())
    }
}
