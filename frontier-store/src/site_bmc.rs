use anyhow::Result;
use frontier_domain::{
    LocationId, OrgId, ProspectingResult, ResourceId, ShipId, SurfaceSite, SurfaceSiteResource,
};
use sqlx::SqliteConnection;
use std::collections::HashSet;

#[derive(sqlx::FromRow)]
struct SiteRow {
    location_id: String,
    body_id: String,
    orbit_node_id: String,
    gravity_m_s2: f64,
}

impl From<SiteRow> for SurfaceSite {
    fn from(row: SiteRow) -> Self {
        SurfaceSite {
            location_id: LocationId(row.location_id),
            body_id: row.body_id,
            orbit_node_id: LocationId(row.orbit_node_id),
            gravity_m_s2: row.gravity_m_s2,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProspectingRow {
    org_id: String,
    site_location_id: String,
    resource_id: String,
    mass_fraction: f64,
    prospected_at: f64,
    prospected_by_ship: String,
}

impl From<ProspectingRow> for ProspectingResult {
    fn from(row: ProspectingRow) -> Self {
        ProspectingResult {
            org_id: OrgId(row.org_id),
            site_location_id: LocationId(row.site_location_id),
            resource_id: ResourceId(row.resource_id),
            mass_fraction: row.mass_fraction,
            prospected_at: row.prospected_at,
            prospected_by_ship: ShipId(row.prospected_by_ship),
        }
    }
}

pub struct SiteBmc;

impl SiteBmc {
    pub async fn upsert_site(conn: &mut SqliteConnection, site: &SurfaceSite) -> Result<()> {
        sqlx::query(
            r#"
insert into surface_sites (location_id, body_id, orbit_node_id, gravity_m_s2)
values (?1, ?2, ?3, ?4)
on conflict (location_id) do update set
  body_id = excluded.body_id,
  orbit_node_id = excluded.orbit_node_id,
  gravity_m_s2 = excluded.gravity_m_s2
            "#,
        )
        .bind(&site.location_id.0)
        .bind(&site.body_id)
        .bind(&site.orbit_node_id.0)
        .bind(site.gravity_m_s2)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn upsert_site_resources(
        conn: &mut SqliteConnection,
        rows: &[SurfaceSiteResource],
    ) -> Result<()> {
        for row in rows {
            sqlx::query(
                r#"
insert into surface_site_resources (site_location_id, resource_id, mass_fraction)
values (?1, ?2, ?3)
on conflict (site_location_id, resource_id) do update set
  mass_fraction = excluded.mass_fraction
                "#,
            )
            .bind(&row.site_location_id.0)
            .bind(&row.resource_id.0)
            .bind(row.mass_fraction)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn get(
        conn: &mut SqliteConnection,
        location_id: &LocationId,
    ) -> Result<Option<SurfaceSite>> {
        let row = sqlx::query_as::<_, SiteRow>(
            "select location_id, body_id, orbit_node_id, gravity_m_s2 from surface_sites where location_id = ?1",
        )
        .bind(&location_id.0)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.map(SurfaceSite::from))
    }

    pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<SurfaceSite>> {
        let rows = sqlx::query_as::<_, SiteRow>(
            r#"
select ss.location_id, ss.body_id, ss.orbit_node_id, ss.gravity_m_s2
from surface_sites ss
join locations l on l.id = ss.location_id
order by l.sort_order, l.name
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(SurfaceSite::from).collect())
    }

    /// Ground-truth distribution, heaviest fraction first.
    pub async fn site_resources(
        conn: &mut SqliteConnection,
        site: &LocationId,
    ) -> Result<Vec<SurfaceSiteResource>> {
        let rows: Vec<(String, f64)> = sqlx::query_as(
            "select resource_id, mass_fraction from surface_site_resources where site_location_id = ?1 order by mass_fraction desc, resource_id",
        )
        .bind(&site.0)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(resource_id, mass_fraction)| SurfaceSiteResource {
                site_location_id: site.clone(),
                resource_id: ResourceId(resource_id),
                mass_fraction,
            })
            .collect())
    }

    pub async fn insert_prospecting_results(
        conn: &mut SqliteConnection,
        results: &[ProspectingResult],
    ) -> Result<()> {
        for result in results {
            sqlx::query(
                r#"
insert into prospecting_results (
  org_id, site_location_id, resource_id, mass_fraction, prospected_at, prospected_by_ship
) values (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&result.org_id.0)
            .bind(&result.site_location_id.0)
            .bind(&result.resource_id.0)
            .bind(result.mass_fraction)
            .bind(result.prospected_at)
            .bind(&result.prospected_by_ship.0)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn is_prospected(
        conn: &mut SqliteConnection,
        org_id: &OrgId,
        site: &LocationId,
    ) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "select 1 from prospecting_results where org_id = ?1 and site_location_id = ?2 limit 1",
        )
        .bind(&org_id.0)
        .bind(&site.0)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.is_some())
    }

    pub async fn prospected_site_ids(
        conn: &mut SqliteConnection,
        org_id: &OrgId,
    ) -> Result<HashSet<LocationId>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "select distinct site_location_id from prospecting_results where org_id = ?1",
        )
        .bind(&org_id.0)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(|(id,)| LocationId(id)).collect())
    }

    pub async fn results_for_org(
        conn: &mut SqliteConnection,
        org_id: &OrgId,
    ) -> Result<Vec<ProspectingResult>> {
        let rows = sqlx::query_as::<_, ProspectingRow>(
            r#"
select org_id, site_location_id, resource_id, mass_fraction, prospected_at, prospected_by_ship
from prospecting_results
where org_id = ?1
order by site_location_id, resource_id
            "#,
        )
        .bind(&org_id.0)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(ProspectingResult::from).collect())
    }
}
