use anyhow::Context;
use api::identity::IdentityVerifier;
use api::store::{CompanyStore, MemoryStore, PgStore, RestStore};
use api::{build_router, AppState, Config, StoreBackend};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn connect_store(backend: &StoreBackend) -> anyhow::Result<Arc<dyn CompanyStore>> {
    let store: Arc<dyn CompanyStore> = match backend {
        StoreBackend::Rest {
            url,
            service_role_key,
            timeout,
        } => {
            tracing::info!(%url, "using hosted REST store");
            Arc::new(
                RestStore::new(url, service_role_key, *timeout)
                    .context("failed to build REST store client")?,
            )
        }
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = PgPoolOptions::new()
                .max_connections(*max_connections)
                .connect(database_url)
                .await
                .context("failed to connect to postgres")?;
            let store = PgStore::new(pool);
            store.migrate().await.context("failed to run migrations")?;
            tracing::info!("using postgres store");
            Arc::new(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let store = connect_store(&config.store).await?;

    let identity = config.identity.as_ref().map(IdentityVerifier::new);
    if identity.is_none() {
        tracing::warn!("AUTH_JWT_SECRET not set, registrations are not identity-checked");
    }

    let app = build_router(AppState::new(store, identity));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "api service starting");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind api listener on {addr}"))?;
    axum::serve(listener, app)
        .await
        .context("api server exited with error")?;
    Ok(())
}
