//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use std::str::FromStr;

use actix_web::{get, post, web, HttpResponse, Responder};
use log::*;
use pulse_engine::{
    db_types::{MerchantId, NewPayment, ProfileId},
    helpers::{checkout_summary, refund_breakdown, PricingConfig},
    traits::{MarketplaceDatabase, OrderAggregation, ProfileManagement},
    OrderAggregator,
    PaymentFeed,
    PaymentFlowApi,
    SessionApi,
};

use crate::{
    data_objects::{
        CheckoutQuoteRequest,
        JsonResponse,
        OnboardingUpdate,
        PaymentNotification,
        PaymentReceipt,
        RefundQuoteRequest,
        SessionQuery,
    },
    errors::ServerError,
    pulse_registry::PulseRegistry,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

fn merchant_from_path(path: web::Path<String>) -> Result<MerchantId, ServerError> {
    MerchantId::from_str(&path.into_inner()).map_err(|e| ServerError::InvalidRequestPath(e.to_string()))
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(merchant_orders => Get "/merchants/{merchant_id}/orders" impl OrderAggregation);
/// A one-off aggregation of the merchant's orders, newest first.
///
/// This endpoint never fails on a backend error. The failure is logged and an empty list is returned, matching what
/// the live pulse shows in the same situation.
pub async fn merchant_orders<B: OrderAggregation>(
    path: web::Path<String>,
    api: web::Data<OrderAggregator<B>>,
) -> Result<HttpResponse, ServerError> {
    let merchant_id = merchant_from_path(path)?;
    trace!("💻️ Fetching orders for merchant {merchant_id}");
    let orders = api.fetch_orders_or_empty(&merchant_id).await;
    Ok(HttpResponse::Ok().json(orders))
}

//----------------------------------------------   Pulse  ----------------------------------------------------
route!(merchant_pulse => Get "/merchants/{merchant_id}/pulse" impl OrderAggregation, PaymentFeed);
/// Returns the merchant's live pulse: the listener state, the orders, the loading flag and the payment alert.
///
/// The first call starts the listener, so it will usually report `loading: true`. Poll to follow the updates.
pub async fn merchant_pulse<B, F>(
    path: web::Path<String>,
    registry: web::Data<PulseRegistry<B, F>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderAggregation,
    F: PaymentFeed,
{
    let merchant_id = merchant_from_path(path)?;
    trace!("💻️ Pulse requested for merchant {merchant_id}");
    let status = registry.status(&merchant_id).await?;
    Ok(HttpResponse::Ok().json(status))
}

route!(stop_merchant_pulse => Delete "/merchants/{merchant_id}/pulse" impl OrderAggregation, PaymentFeed);
pub async fn stop_merchant_pulse<B, F>(
    path: web::Path<String>,
    registry: web::Data<PulseRegistry<B, F>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderAggregation,
    F: PaymentFeed,
{
    let merchant_id = merchant_from_path(path)?;
    if registry.stop(&merchant_id).await {
        Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Pulse for {merchant_id} stopped."))))
    } else {
        debug!("💻️ No pulse listener is running for {merchant_id}");
        Err(ServerError::NoRecordFound(format!("No pulse is running for {merchant_id}")))
    }
}

//------------------------------------------   Incoming payments  ---------------------------------------------
route!(incoming_payment => Post "/payments" impl MarketplaceDatabase);
pub async fn incoming_payment<B: MarketplaceDatabase>(
    api: web::Data<PaymentFlowApi<B>>,
    body: web::Json<PaymentNotification>,
) -> Result<HttpResponse, ServerError> {
    let payment = NewPayment::from(body.into_inner());
    info!("💻️ Payment notification received for goal {}: [{}] {}", payment.goal_id, payment.txid, payment.amount);
    let processed = api.process_new_payment(payment).await.map_err(|e| {
        debug!("💻️ Could not process payment. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(PaymentReceipt::from(processed)))
}

//----------------------------------------------   Session  ----------------------------------------------------
route!(next_screen => Get "/session/route" impl ProfileManagement);
/// Where the client should send the user next. Leave out `user_id` for an anonymous session.
pub async fn next_screen<B: ProfileManagement>(
    query: web::Query<SessionQuery>,
    api: web::Data<SessionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user = query.into_inner().user_id.filter(|s| !s.trim().is_empty()).map(ProfileId::from);
    let route = api.route_for(user.as_ref()).await?;
    Ok(HttpResponse::Ok().json(route))
}

route!(advance_onboarding => Post "/session/onboarding" impl ProfileManagement);
pub async fn advance_onboarding<B: ProfileManagement>(
    body: web::Json<OnboardingUpdate>,
    api: web::Data<SessionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let OnboardingUpdate { user_id, step } = body.into_inner();
    let id = ProfileId::from_str(&user_id).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    let route = api.advance_onboarding(&id, step).await?;
    Ok(HttpResponse::Ok().json(route))
}

//----------------------------------------------   Quotes  ----------------------------------------------------
#[post("/checkout/quote")]
pub async fn checkout_quote(
    config: web::Data<PricingConfig>,
    body: web::Json<CheckoutQuoteRequest>,
) -> Result<HttpResponse, ServerError> {
    let summary = checkout_summary(&body.lines, &config)?;
    Ok(HttpResponse::Ok().json(summary))
}

#[post("/refunds/quote")]
pub async fn refund_quote(
    config: web::Data<PricingConfig>,
    body: web::Json<RefundQuoteRequest>,
) -> Result<HttpResponse, ServerError> {
    let breakdown = refund_breakdown(body.amount, &config)?;
    Ok(HttpResponse::Ok().json(breakdown))
}
