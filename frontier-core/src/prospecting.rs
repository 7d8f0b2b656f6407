use crate::sim_clock::GameClock;
use anyhow::Result;
use frontier_domain::{
    GameError, GameResult, ItemCategory, LocationId, OrgId, ProspectingResult, ResourceId,
    ShipId, SurfaceSiteResource,
};
use frontier_store::{LocationBmc, ShipBmc, SiteBmc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::info;

#[derive(Serialize, Debug, Clone)]
pub struct ResourceFraction {
    pub resource_id: ResourceId,
    pub mass_fraction: f64,
}

/// A surface site as one org sees it: ground truth stays hidden until that
/// org has prospected the site.
#[derive(Serialize, Debug, Clone)]
pub struct SurfaceSiteView {
    pub location_id: LocationId,
    pub name: String,
    pub body_id: String,
    pub orbit_node_id: LocationId,
    pub gravity_m_s2: f64,
    pub is_prospected: bool,
    pub resource_distribution: Vec<ResourceFraction>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ProspectReport {
    pub site_location_id: LocationId,
    pub ship_id: ShipId,
    pub ship_name: String,
    pub resources_found: Vec<ResourceFraction>,
    pub prospected_at: f64,
}

fn fractions(rows: Vec<SurfaceSiteResource>) -> Vec<ResourceFraction> {
    rows.into_iter()
        .map(|r| ResourceFraction {
            resource_id: r.resource_id,
            mass_fraction: r.mass_fraction,
        })
        .collect()
}

/// All sites with the per-org visibility overlay applied.
pub async fn surface_sites_for_org(
    conn: &mut SqliteConnection,
    org_id: &OrgId,
) -> Result<Vec<SurfaceSiteView>> {
    let prospected = SiteBmc::prospected_site_ids(&mut *conn, org_id).await?;
    let sites = SiteBmc::list(&mut *conn).await?;

    let mut views = Vec::with_capacity(sites.len());
    for site in sites {
        let name = LocationBmc::get(&mut *conn, &site.location_id)
            .await?
            .map(|l| l.name)
            .unwrap_or_else(|| site.location_id.0.clone());
        let is_prospected = prospected.contains(&site.location_id);
        let resource_distribution = if is_prospected {
            fractions(SiteBmc::site_resources(&mut *conn, &site.location_id).await?)
        } else {
            Vec::new()
        };
        views.push(SurfaceSiteView {
            location_id: site.location_id,
            name,
            body_id: site.body_id,
            orbit_node_id: site.orbit_node_id,
            gravity_m_s2: site.gravity_m_s2,
            is_prospected,
            resource_distribution,
        });
    }
    Ok(views)
}

pub async fn surface_site_for_org(
    conn: &mut SqliteConnection,
    org_id: &OrgId,
    site_id: &LocationId,
) -> GameResult<SurfaceSiteView> {
    let site = SiteBmc::get(&mut *conn, site_id)
        .await?
        .ok_or_else(|| GameError::not_found(format!("surface site '{site_id}'")))?;
    let name = LocationBmc::get(&mut *conn, site_id)
        .await?
        .map(|l| l.name)
        .unwrap_or_else(|| site_id.0.clone());
    let is_prospected = SiteBmc::is_prospected(&mut *conn, org_id, site_id).await?;
    let resource_distribution = if is_prospected {
        fractions(SiteBmc::site_resources(&mut *conn, site_id).await?)
    } else {
        Vec::new()
    };
    Ok(SurfaceSiteView {
        location_id: site.location_id,
        name,
        body_id: site.body_id,
        orbit_node_id: site.orbit_node_id,
        gravity_m_s2: site.gravity_m_s2,
        is_prospected,
        resource_distribution,
    })
}

/// Prospect a site with a robonaut-equipped ship docked there, copying the
/// ground-truth distribution into the org's visibility overlay.
pub async fn prospect(
    conn: &mut SqliteConnection,
    clock: &dyn GameClock,
    org_id: &OrgId,
    ship_id: &ShipId,
    site_id: &LocationId,
) -> GameResult<ProspectReport> {
    let now = clock.now_s();
    ShipBmc::settle_arrivals(&mut *conn, now).await?;

    let ship = ShipBmc::get(&mut *conn, ship_id)
        .await?
        .ok_or_else(|| GameError::not_found(format!("ship '{ship_id}'")))?;

    match ship.docked_at() {
        Some(loc) if loc == site_id => {}
        Some(_) => {
            return Err(GameError::validation(
                "ship is not at the specified site location",
            ))
        }
        None => return Err(GameError::NotDocked(ship_id.clone())),
    }

    let has_robonaut = ship
        .parts
        .iter()
        .any(|p| p.category() == ItemCategory::Robonaut);
    if !has_robonaut {
        return Err(GameError::validation(
            "ship must have a robonaut equipped to prospect",
        ));
    }

    SiteBmc::get(&mut *conn, site_id)
        .await?
        .ok_or_else(|| GameError::validation("location is not a surface site"))?;

    if SiteBmc::is_prospected(&mut *conn, org_id, site_id).await? {
        return Err(GameError::AlreadyProspected(site_id.clone()));
    }

    let ground_truth = SiteBmc::site_resources(&mut *conn, site_id).await?;
    let results: Vec<ProspectingResult> = ground_truth
        .iter()
        .map(|r| ProspectingResult {
            org_id: org_id.clone(),
            site_location_id: site_id.clone(),
            resource_id: r.resource_id.clone(),
            mass_fraction: r.mass_fraction,
            prospected_at: now,
            prospected_by_ship: ship_id.clone(),
        })
        .collect();
    SiteBmc::insert_prospecting_results(&mut *conn, &results).await?;

    info!(org = %org_id, site = %site_id, ship = %ship_id, "site prospected");
    Ok(ProspectReport {
        site_location_id: site_id.clone(),
        ship_id: ship_id.clone(),
        ship_name: ship.name,
        resources_found: fractions(ground_truth),
        prospected_at: now,
    })
}

#[derive(Serialize, Debug, Clone)]
pub struct ProspectedSite {
    pub site_location_id: LocationId,
    pub prospected_at: f64,
    pub prospected_by_ship: ShipId,
    pub resources: Vec<ResourceFraction>,
}

/// Everything this org has prospected, grouped per site.
pub async fn prospected_sites(
    conn: &mut SqliteConnection,
    org_id: &OrgId,
) -> Result<Vec<ProspectedSite>> {
    let rows = SiteBmc::results_for_org(&mut *conn, org_id).await?;
    let mut sites: Vec<ProspectedSite> = Vec::new();
    for row in rows {
        match sites.last_mut() {
            Some(site) if site.site_location_id == row.site_location_id => {
                site.resources.push(ResourceFraction {
                    resource_id: row.resource_id,
                    mass_fraction: row.mass_fraction,
                });
            }
            _ => sites.push(ProspectedSite {
                site_location_id: row.site_location_id,
                prospected_at: row.prospected_at,
                prospected_by_ship: row.prospected_by_ship,
                resources: vec![ResourceFraction {
                    resource_id: row.resource_id,
                    mass_fraction: row.mass_fraction,
                }],
            }),
        }
    }
    Ok(sites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogRegistry;
    use crate::graph::{ensure_solar_system_expansion, seed_locations_and_edges_if_empty};
    use crate::parts::normalize_parts;
    use crate::sim_clock::FakeClock;
    use frontier_domain::{Organization, Ship};
    use frontier_store::{connect_in_memory, OrgBmc};
    use serde_json::json;

    async fn ship_at(
        conn: &mut sqlx::SqliteConnection,
        registry: &CatalogRegistry,
        id: &str,
        location: &str,
        with_robonaut: bool,
    ) -> ShipId {
        let mut raw = vec![json!({ "item_id": "ntr_m1_kiwi" })];
        if with_robonaut {
            raw.push(json!({ "item_id": "robonaut_scout_mk1" }));
        }
        let parts = normalize_parts(registry, &raw);
        let ship = Ship {
            id: ShipId(id.to_string()),
            name: id.to_string(),
            shape: "triangle".to_string(),
            color: "#ffffff".to_string(),
            size_px: 12,
            notes: vec![],
            location_id: Some(LocationId::new(location)),
            transit: None,
            parts,
            fuel_kg: 0.0,
            fuel_capacity_kg: 0.0,
            dry_mass_kg: 0.0,
            isp_s: 0.0,
        };
        ShipBmc::insert(conn, &ship).await.unwrap();
        ship.id
    }

    async fn test_org(conn: &mut sqlx::SqliteConnection, id: &str) -> OrgId {
        let org = Organization {
            id: OrgId(id.to_string()),
            name: id.to_string(),
            balance_usd: 0.0,
            research_points: 0.0,
            last_settled_at: 0.0,
            created_at: 0.0,
        };
        OrgBmc::insert(conn, &org).await.unwrap();
        org.id
    }

    #[tokio::test]
    async fn visibility_overlay_is_per_org() {
        let pool = connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let registry = CatalogRegistry::builtin();
        let clock = FakeClock::at(0.0);

        seed_locations_and_edges_if_empty(&mut conn).await.unwrap();
        ensure_solar_system_expansion(&mut conn).await.unwrap();

        let org_a = test_org(&mut conn, "org-a").await;
        let org_b = test_org(&mut conn, "org-b").await;
        let site = LocationId::new("MARS_UTOPIA");
        let ship = ship_at(&mut conn, &registry, "prospector", "MARS_UTOPIA", true).await;

        let before = surface_site_for_org(&mut conn, &org_a, &site).await.unwrap();
        assert!(!before.is_prospected);
        assert!(before.resource_distribution.is_empty());

        let report = prospect(&mut conn, &clock, &org_a, &ship, &site).await.unwrap();
        assert_eq!(report.resources_found.len(), 2);

        let after = surface_site_for_org(&mut conn, &org_a, &site).await.unwrap();
        assert!(after.is_prospected);
        // sorted by descending mass fraction
        assert_eq!(after.resource_distribution[0].resource_id.0, "silica");
        assert!((after.resource_distribution[0].mass_fraction - 0.6).abs() < 1e-9);
        assert_eq!(after.resource_distribution[1].resource_id.0, "iron_oxide");

        // org B still sees nothing
        let other = surface_site_for_org(&mut conn, &org_b, &site).await.unwrap();
        assert!(!other.is_prospected);
        assert!(other.resource_distribution.is_empty());

        let err = prospect(&mut conn, &clock, &org_a, &ship, &site)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::AlreadyProspected(_)));
    }

    #[tokio::test]
    async fn prospecting_needs_a_robonaut_on_site() {
        let pool = connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let registry = CatalogRegistry::builtin();
        let clock = FakeClock::at(0.0);

        seed_locations_and_edges_if_empty(&mut conn).await.unwrap();
        ensure_solar_system_expansion(&mut conn).await.unwrap();
        let org = test_org(&mut conn, "org-c").await;
        let site = LocationId::new("LUNA_SOUTH_POLE");

        let bare = ship_at(&mut conn, &registry, "bare", "LUNA_SOUTH_POLE", false).await;
        let err = prospect(&mut conn, &clock, &org, &bare, &site).await.unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));

        let elsewhere = ship_at(&mut conn, &registry, "faraway", "LEO", true).await;
        let err = prospect(&mut conn, &clock, &org, &elsewhere, &site)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));
    }
}
