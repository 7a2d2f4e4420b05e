//! Unified game server.
//!
//! Wires the stores, ledger, engine, router, poller, and recovery sweep
//! into one process and serves the HTTP health endpoint.
//!
//! ## Submodules
//!
//! - [`broadcast`] — pub/sub broadcaster behind the engine's event seam
//! - [`intake`] — cluster command subscription into the room serializer

mod broadcast;
mod intake;

pub use broadcast::*;
pub use intake::*;

use actix_cors::Cors;
use actix_web::App;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use actix_web::Responder;
use actix_web::middleware::Logger;
use actix_web::web;
use gb_keyed::ActiveGames;
use gb_keyed::KeyedStore;
use gb_keyed::RedisStore;
use gb_ledger::Accounts;
use gb_ledger::CreditLog;
use gb_ledger::CreditRepository;
use gb_ledger::Ledger;
use gb_ledger::MerchantLedger;
use gb_ledger::MerchantTag;
use gb_ledger::PgMerchants;
use gb_lowcard::BotManager;
use gb_lowcard::Broadcaster;
use gb_lowcard::GameRepository;
use gb_lowcard::Games;
use gb_lowcard::History;
use gb_lowcard::LowCard;
use gb_lowcard::Poller;
use gb_lowcard::RoomAdmins;
use gb_lowcard::Rooms;
use gb_lowcard::Summaries;
use gb_lowcard::recovery;
use gb_pg::PgErr;
use gb_pg::Schema;
use gb_router::RoomSerializer;
use gb_router::Router;
use std::sync::Arc;
use tokio_postgres::Client;

async fn health(client: web::Data<Arc<Client>>) -> impl Responder {
    match client
        .execute("SELECT 1", &[])
        .await
        .inspect_err(|e| log::error!("health check failed: {}", e))
    {
        Ok(_) => HttpResponse::Ok().body("ok"),
        Err(_) => HttpResponse::ServiceUnavailable().body("database unavailable"),
    }
}

/// Ensures every table the engine touches exists.
async fn migrate(client: &Client) -> Result<(), PgErr> {
    Accounts::migrate(client).await?;
    CreditLog::migrate(client).await?;
    MerchantTag::migrate(client).await?;
    Rooms::migrate(client).await?;
    RoomAdmins::migrate(client).await?;
    History::migrate(client).await?;
    Games::migrate(client).await?;
    Summaries::migrate(client).await?;
    Ok(())
}

pub async fn run() -> Result<(), std::io::Error> {
    let client = gb_pg::db().await;
    migrate(&client).await.expect("run migrations");
    let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");
    let store: Arc<dyn KeyedStore> = Arc::new(
        RedisStore::connect(&url)
            .await
            .expect("keyed store connection failed"),
    );
    let credits: Arc<dyn CreditRepository> = Arc::new(client.clone());
    let merchants: Arc<dyn MerchantLedger> = Arc::new(PgMerchants::new(client.clone()));
    let ledger = Arc::new(Ledger::new(credits, merchants, store.clone()));
    let games: Arc<dyn GameRepository> = Arc::new(client.clone());
    let broadcast: Arc<dyn Broadcaster> = Arc::new(PubSubBroadcaster::new(store.clone()));
    let engine = Arc::new(LowCard::new(
        store.clone(),
        ledger.clone(),
        games.clone(),
        broadcast,
    ));

    // Refund anything stranded by the previous process before serving.
    match recovery::sweep(&store, &ledger).await {
        Ok(refunded) => log::info!("recovery sweep done ({} refunds)", refunded),
        Err(e) => log::error!("recovery sweep failed: {}", e),
    }

    let bots = Arc::new(BotManager::new(store.clone(), games.clone(), engine.clone()));
    let router = Arc::new(Router::new(
        engine.clone(),
        bots,
        games.clone(),
        ActiveGames::new(store.clone()),
    ));
    let serializer = RoomSerializer::new(router);

    tokio::spawn(Poller::new(engine.clone(), store.clone()).run());
    {
        let store = store.clone();
        tokio::spawn(async move {
            if let Err(e) = intake(store, serializer).await {
                log::error!("command intake failed: {}", e);
            }
        });
    }

    let client = web::Data::new(client);
    log::info!("starting game server");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%r %s %Ts"))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header(),
            )
            .app_data(client.clone())
            .route("/health", web::get().to(health))
    })
    .workers(2)
    .bind(std::env::var("BIND_ADDR").expect("BIND_ADDR must be set"))?
    .run()
    .await
}
