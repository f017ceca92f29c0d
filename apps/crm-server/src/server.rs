use std::net::{Ipv4Addr, SocketAddr};

use anyhow::{Context, Result};
use crm_bootstrap::{AppConfig, DatabaseConfig, GrpcConfig, cancel_on_shutdown};
use crm_db::{ConnectOpts, DbHandle};
use crm_transport_grpc::layers::server_stack;
use customers::{CustomersConfig, CustomersModule};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

use crate::health::{self, HealthState};

/// Connect, migrate, serve gRPC and health HTTP until a shutdown signal, then drain.
pub async fn run(config: &AppConfig, skip_migrations: bool) -> Result<()> {
    let dsn = config.database.dsn()?;
    let db = DbHandle::connect(&dsn, connect_opts(&config.database))
        .await
        .context("failed to connect to Postgres")?;

    if skip_migrations {
        tracing::warn!("Skipping schema migrations (--skip-migrations)");
    } else {
        CustomersModule::migrate(&db)
            .await
            .context("schema migration failed")?;
    }

    let module = CustomersModule::new(&db, customers_config(&config.grpc));
    let health = HealthState::new(db.clone(), config.server.environment.clone());

    let grpc_listener = bind(config.grpc.port, "gRPC").await?;
    let http_listener = bind(config.http.port, "HTTP").await?;

    let cancel = CancellationToken::new();
    let signals = cancel_on_shutdown(cancel.clone());

    let mut grpc = tokio::spawn(serve_grpc(
        grpc_listener,
        module,
        health.clone(),
        cancel.clone(),
    ));
    let mut http = tokio::spawn(serve_http(http_listener, health, cancel.clone()));

    cancel.cancelled().await;
    let timeout = config.server.shutdown_timeout;
    let drained = tokio::time::timeout(timeout, async {
        (joined(&mut grpc).await, joined(&mut http).await)
    })
    .await;
    let outcome = match drained {
        Ok((grpc_res, http_res)) => grpc_res.and(http_res),
        Err(_) => {
            tracing::warn!(?timeout, "servers did not drain in time; aborting");
            grpc.abort();
            http.abort();
            Ok(())
        }
    };

    signals.abort();
    db.close().await;
    tracing::info!("CRM server stopped");
    outcome
}

async fn bind(port: u16, what: &str) -> Result<TcpListener> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {what} listener on {addr}"))?;
    tracing::info!(%addr, transport = "tcp", "{what} server listening");
    Ok(listener)
}

async fn joined(handle: &mut JoinHandle<Result<()>>) -> Result<()> {
    handle.await.context("server task panicked")?
}

// Whichever server stops first takes the other one down with it.
async fn serve_grpc(
    listener: TcpListener,
    module: CustomersModule,
    health: HealthState,
    cancel: CancellationToken,
) -> Result<()> {
    let _stop_all = cancel.clone().drop_guard();
    health.set_grpc_serving(true);

    let result = Server::builder()
        .layer(server_stack())
        .add_service(module.customer_server())
        .add_service(module.vehicle_server())
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            cancel.cancelled().await;
            tracing::info!("gRPC server shutting down gracefully (cancellation)");
        })
        .await;

    health.set_grpc_serving(false);
    result.context("gRPC server failed")
}

async fn serve_http(
    listener: TcpListener,
    health: HealthState,
    cancel: CancellationToken,
) -> Result<()> {
    let _stop_all = cancel.clone().drop_guard();
    axum::serve(listener, health::router(health))
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully (cancellation)");
        })
        .await
        .context("HTTP server failed")
}

// sqlx has no idle cap; the idle count becomes the number of connections kept warm.
fn connect_opts(db: &DatabaseConfig) -> ConnectOpts {
    ConnectOpts {
        max_conns: Some(db.max_open_conns),
        min_conns: Some(db.max_idle_conns),
        acquire_timeout: Some(db.acquire_timeout),
        idle_timeout: None,
        max_lifetime: Some(db.conn_max_lifetime),
        test_before_acquire: false,
    }
}

fn customers_config(grpc: &GrpcConfig) -> CustomersConfig {
    CustomersConfig {
        default_limit: grpc.default_limit,
        max_list_limit: grpc.max_list_limit,
        max_search_limit: grpc.max_search_limit,
    }
}
