pub mod handlers;
pub mod routes;

use crate::config::Config;
use crate::db::Store;
use crate::orchestrator::Orchestrator;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<Store>>,
    pub config: Arc<Config>,
}

pub async fn serve(config: Arc<Config>, orchestrator: &Orchestrator) -> std::io::Result<()> {
    let state = AppState {
        store: orchestrator.store().clone(),
        config: config.clone(),
    };
    let app = routes::build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "http server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
