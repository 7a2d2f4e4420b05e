//! Game Server Binary
//!
//! Runs the recovery sweep, the timer poller, the command intake, and the
//! HTTP health endpoint in one process. Binds BIND_ADDR (e.g. 0.0.0.0:8888).

#[tokio::main]
async fn main() {
    gb_core::log();
    gb_server::run().await.unwrap();
}
