use crate::catalog::CatalogRegistry;
use crate::graph::{ensure_solar_system_expansion, seed_locations_and_edges_if_empty};
use crate::router::regenerate_matrix_if_needed;
use crate::shipyard::ensure_baseline_ship;
use crate::sim_clock::{load_clock_state, SimClock};
use anyhow::Result;
use frontier_store::{run_migrations, DbModelManager, ShipBmc};
use tracing::info;

/// Bring a freshly opened store up to a playable state. Order matters:
/// migrations, seed, expansion, hygiene, clock, matrix.
pub async fn run_startup(
    mm: &DbModelManager,
    clock: &SimClock,
    registry: &CatalogRegistry,
) -> Result<()> {
    run_migrations(mm.pool()).await?;

    let mut tx = mm.begin().await?;
    seed_locations_and_edges_if_empty(&mut tx).await?;
    ensure_solar_system_expansion(&mut tx).await?;
    let purged = ShipBmc::purge_test_ships(&mut tx).await?;
    if purged > 0 {
        info!(purged, "purged test ships");
    }
    ensure_baseline_ship(&mut tx, registry).await?;
    load_clock_state(&mut tx, clock).await?;
    let rebuilt = regenerate_matrix_if_needed(&mut tx).await?;
    tx.commit().await?;

    info!(matrix_rebuilt = rebuilt, "startup sequence complete");
    Ok(())
}
