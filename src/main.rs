//! Membership billing service entry point.
//!
//! Composition root: every adapter is built here and handed to the HTTP
//! state explicitly.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tracing_subscriber::EnvFilter;

use membership_billing::adapters::events::InMemoryEventBus;
use membership_billing::adapters::http::{app_router, JwtAuthenticator, MembershipAppState};
use membership_billing::adapters::memory::{
    InMemoryAuditLog, InMemoryCouponRepository, InMemoryMembershipRepository, InMemoryPlanCatalog,
    InMemoryUserDirectory,
};
use membership_billing::adapters::notifications::{LogMailer, MembershipNotifier};
use membership_billing::adapters::postgres::{
    PostgresAuditLog, PostgresCouponRepository, PostgresMembershipRepository, PostgresPlanCatalog,
    PostgresUserDirectory,
};
use membership_billing::adapters::stripe::{MockPaymentProvider, StripeConfig, StripePaymentAdapter};
use membership_billing::application::handlers::membership::CheckoutSettings;
use membership_billing::config::{AppConfig, DatabaseConfig, PaymentConfig, ServerConfig};
use membership_billing::domain::membership::StripeWebhookVerifier;
use membership_billing::ports::{
    AuditLog, CouponRepository, EventSubscriber, MembershipRepository, PaymentProvider,
    PlanCatalog, UserDirectory,
};
use secrecy::ExposeSecret;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

struct Stores {
    memberships: Arc<dyn MembershipRepository>,
    coupons: Arc<dyn CouponRepository>,
    plans: Arc<dyn PlanCatalog>,
    users: Arc<dyn UserDirectory>,
    audit_log: Arc<dyn AuditLog>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let stores = match &config.database {
        Some(database) => postgres_stores(database).await?,
        None => {
            tracing::warn!("No database configured; using in-memory stores");
            memory_stores()
        }
    };
    let payment_provider = payment_provider(&config.payment)?;

    let bus = Arc::new(InMemoryEventBus::new());
    bus.subscribe_all(
        MembershipNotifier::EVENT_TYPES,
        Arc::new(MembershipNotifier::new(Arc::new(LogMailer::new()))),
    );

    let state = MembershipAppState {
        memberships: stores.memberships,
        coupons: stores.coupons,
        plans: stores.plans,
        users: stores.users,
        audit_log: stores.audit_log,
        payment_provider,
        event_publisher: bus,
        webhook_verifier: StripeWebhookVerifier::new(
            config.payment.webhook_secret().expose_secret().as_str(),
        )
        .with_tolerance(config.payment.webhook_tolerance_secs),
        checkout: CheckoutSettings {
            currency: config.payment.currency.clone(),
            success_url: config.payment.success_url.clone(),
            cancel_url: config.payment.cancel_url.clone(),
        },
    };
    let authenticator = Arc::new(JwtAuthenticator::new(
        &config.auth.jwt_secret(),
        config.auth.issuer.as_deref(),
        config.auth.audience.as_deref(),
    ));

    let app = app_router(state, authenticator)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(cors_layer(&config.server))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "Membership billing listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if server.json_logs {
        builder.json().with_current_span(false).init();
    } else {
        builder.init();
    }
}

async fn postgres_stores(database: &DatabaseConfig) -> Result<Stores, BoxError> {
    let pool = PgPoolOptions::new()
        .min_connections(database.min_connections)
        .max_connections(database.max_connections)
        .acquire_timeout(database.connect_timeout())
        .connect(&database.url)
        .await?;

    if database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    Ok(Stores {
        memberships: Arc::new(PostgresMembershipRepository::new(pool.clone())),
        coupons: Arc::new(PostgresCouponRepository::new(pool.clone())),
        plans: Arc::new(PostgresPlanCatalog::new(pool.clone())),
        users: Arc::new(PostgresUserDirectory::new(pool.clone())),
        audit_log: Arc::new(PostgresAuditLog::new(pool)),
    })
}

fn memory_stores() -> Stores {
    Stores {
        memberships: Arc::new(InMemoryMembershipRepository::new()),
        coupons: Arc::new(InMemoryCouponRepository::new()),
        plans: Arc::new(InMemoryPlanCatalog::new()),
        users: Arc::new(InMemoryUserDirectory::new()),
        audit_log: Arc::new(InMemoryAuditLog::new()),
    }
}

fn payment_provider(payment: &PaymentConfig) -> Result<Arc<dyn PaymentProvider>, BoxError> {
    if payment.use_mock_provider {
        tracing::warn!("Using the mock payment provider; no charges will be made");
        return Ok(Arc::new(MockPaymentProvider::new()));
    }

    let stripe = StripeConfig::new(payment.api_key()).with_base_url(payment.api_base_url.clone());
    Ok(Arc::new(StripePaymentAdapter::new(stripe)?))
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::new()
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
