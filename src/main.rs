use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use innkeep::config::AppConfig;
use innkeep::http;
use innkeep::model::NewRoom;
use innkeep::ops::Desk;
use innkeep::rate_limit::RateLimits;
use innkeep::store::{EntityStore, MemoryStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env();
    innkeep::observability::init(config.metrics_port);

    let store = Arc::new(MemoryStore::new());
    if config.seed_demo && store.room_count() == 0 {
        seed_rooms(store.as_ref()).await?;
    }

    let desk = Arc::new(Desk::new(store));
    let limits = Arc::new(RateLimits::new(&config.rate_limit));
    let app = http::router(desk, limits);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("innkeep listening on {addr}");
    info!("  rate limiting: {}", if config.rate_limit.enabled { "enabled" } else { "disabled" });
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("innkeep stopped");
    Ok(())
}

/// Starter inventory for an empty store; real deployments load rooms from
/// their own provisioning.
async fn seed_rooms(store: &MemoryStore) -> Result<(), Box<dyn std::error::Error>> {
    let rooms = [
        ("101", 9000, 2),
        ("102", 9000, 2),
        ("201", 12000, 3),
        ("202", 12000, 3),
        ("301", 18000, 4),
    ];
    for (number, price, capacity) in rooms {
        store
            .insert_room(NewRoom {
                number: number.into(),
                price,
                capacity,
                available: true,
            })
            .await?;
    }
    info!("seeded {} demo rooms", rooms.len());
    Ok(())
}

/// Stop accepting on SIGTERM/ctrl-c; axum drains in-flight requests.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received");
}
