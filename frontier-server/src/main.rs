mod error;
mod handlers;
mod state;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use frontier_core::catalog::CatalogRegistry;
use frontier_core::sim_clock::SimClock;
use frontier_core::startup::run_startup;
use frontier_store::{connect, DbModelManager};
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "frontier-server", about = "Authoritative space-logistics simulation server")]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://frontier.db")]
    database_url: String,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    bind_addr: String,

    /// Virtual-time multiplier: one real second advances this many game
    /// seconds.
    #[arg(long, env = "GAME_TIME_SCALE", default_value_t = 48.0)]
    game_time_scale: f64,

    /// Development shortcut: requests without a username act as "dev".
    #[arg(long, env = "DEV_SKIP_AUTH", default_value_t = false)]
    dev_skip_auth: bool,
}

fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/locations", get(handlers::locations))
        .route("/api/locations/tree", get(handlers::locations_tree))
        .route("/api/route", get(handlers::route))
        .route("/api/state", get(handlers::fleet_state))
        .route("/api/ships/:ship_id", get(handlers::ship_detail))
        .route("/api/ships/:ship_id/dispatch", post(handlers::dispatch))
        .route("/api/ships/:ship_id/prospect", post(handlers::prospect))
        .route(
            "/api/ships/:ship_id/deconstruct",
            post(handlers::deconstruct),
        )
        .route("/api/inventory/:location_id", get(handlers::inventory_at))
        .route("/api/surface_sites", get(handlers::surface_sites))
        .route(
            "/api/surface_sites/:site_id",
            get(handlers::surface_site_detail),
        )
        .route("/api/org", get(handlers::org))
        .route("/api/org/hire-team", post(handlers::hire_team))
        .route("/api/org/fire-team", post(handlers::fire_team))
        .route("/api/org/unlock-tech", post(handlers::unlock_tech))
        .route("/api/org/unlocked-techs", get(handlers::unlocked_techs))
        .route("/api/org/boostable-items", get(handlers::boostable_items))
        .route("/api/org/boost-cost", post(handlers::boost_cost))
        .route("/api/org/boost", post(handlers::boost_to_leo))
        .route("/api/org/boost-history", get(handlers::boost_history))
        .route("/api/org/prospected-sites", get(handlers::prospected_sites))
        .route("/api/shipyard/catalog", get(handlers::shipyard_catalog))
        .route("/api/shipyard/preview", post(handlers::shipyard_preview))
        .route("/api/shipyard/build", post(handlers::shipyard_build))
        .route("/api/sim", get(handlers::sim_status))
        .route("/api/sim/pause", post(handlers::sim_pause))
        .route("/api/sim/reset", post(handlers::sim_reset))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let pool = connect(&cli.database_url).await?;
    let mm = DbModelManager::new(pool);
    let clock = Arc::new(SimClock::new(cli.game_time_scale));
    let registry = Arc::new(CatalogRegistry::builtin());

    run_startup(&mm, &clock, &registry).await?;

    let state = AppState {
        mm,
        clock,
        registry,
        dev_skip_auth: cli.dev_skip_auth,
    };
    let app = api_router(state);

    let listener = tokio::net::TcpListener::bind(&cli.bind_addr).await?;
    info!("listening on {}", cli.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
