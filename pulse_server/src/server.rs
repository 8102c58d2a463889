use std::{future::Future, pin::Pin, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use pulse_engine::{
    events::{EventHandlers, EventHooks, EventProducers, GoalCompletedEvent},
    helpers::PricingConfig,
    MerchantPulse,
    OrderAggregator,
    PaymentBroadcaster,
    PaymentFlowApi,
    SessionApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    pulse_registry::{start_idle_sweeper, PulseRegistry},
    routes::{
        checkout_quote,
        health,
        refund_quote,
        AdvanceOnboardingRoute,
        IncomingPaymentRoute,
        MerchantOrdersRoute,
        MerchantPulseRoute,
        NextScreenRoute,
        StopMerchantPulseRoute,
    },
};

pub type PulseRegistryData = web::Data<PulseRegistry<SqliteDatabase, PaymentBroadcaster>>;

/// Everything the request handlers share across workers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqliteDatabase,
    pub producers: EventProducers,
    pub registry: PulseRegistryData,
    pub pricing: PricingConfig,
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let broadcaster = PaymentBroadcaster::new(config.feed_capacity);
    let handlers = EventHandlers::new(config.event_buffer_size, default_hooks(&broadcaster));
    let producers = handlers.producers();
    let hook_tasks = handlers.start_handlers();
    let pulse = MerchantPulse::new(db.clone(), broadcaster, config.pulse.clone());
    let registry = web::Data::new(PulseRegistry::new(pulse, config.registry));
    let sweeper = start_idle_sweeper(registry.clone());
    let state = AppState { db, producers, registry: registry.clone(), pricing: config.pricing.clone() };
    let srv = create_server_instance(&config, state)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    sweeper.abort();
    registry.shutdown_all().await;
    // The workers held the last event producers, so the hook tasks drain and exit now
    for task in hook_tasks {
        if let Err(e) = task.await {
            warn!("📬️ Event handler did not shut down cleanly. {e}");
        }
    }
    result
}

/// The payment feed is fed by the `on_payment_received` hook. Completed goals are logged.
pub fn default_hooks(broadcaster: &PaymentBroadcaster) -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.add_payment_received_handler(broadcaster.hook());
    hooks.on_goal_completed(|ev: GoalCompletedEvent| {
        Box::pin(async move {
            info!("🎯️ Goal {} on listing {} has been paid off", ev.goal.id, ev.goal.listing_id);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks
}

pub fn create_server_instance(config: &ServerConfig, state: AppState) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mps::access_log"))
            .configure(|cfg| configure_app(cfg, &state))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

pub fn configure_app(cfg: &mut web::ServiceConfig, state: &AppState) {
    let orders_api = OrderAggregator::new(state.db.clone());
    let payments_api = PaymentFlowApi::new(state.db.clone(), state.producers.clone());
    let session_api = SessionApi::new(state.db.clone());
    let api_scope = web::scope("/api")
        .service(MerchantOrdersRoute::<SqliteDatabase>::new())
        .service(MerchantPulseRoute::<SqliteDatabase, PaymentBroadcaster>::new())
        .service(StopMerchantPulseRoute::<SqliteDatabase, PaymentBroadcaster>::new())
        .service(IncomingPaymentRoute::<SqliteDatabase>::new())
        .service(NextScreenRoute::<SqliteDatabase>::new())
        .service(AdvanceOnboardingRoute::<SqliteDatabase>::new())
        .service(checkout_quote)
        .service(refund_quote);
    cfg.app_data(web::Data::new(orders_api))
        .app_data(web::Data::new(payments_api))
        .app_data(web::Data::new(session_api))
        .app_data(web::Data::new(state.pricing.clone()))
        .app_data(state.registry.clone())
        .service(health)
        .service(api_scope);
}
