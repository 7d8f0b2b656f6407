use anyhow::Result;
use frontier_domain::{Location, LocationId, TransferEdge};
use sqlx::SqliteConnection;

#[derive(sqlx::FromRow)]
struct LocationRow {
    id: String,
    name: String,
    parent_id: Option<String>,
    is_group: bool,
    sort_order: i64,
    x: f64,
    y: f64,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location {
            id: LocationId(row.id),
            name: row.name,
            parent_id: row.parent_id.map(LocationId),
            is_group: row.is_group,
            sort_order: row.sort_order,
            x: row.x,
            y: row.y,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EdgeRow {
    from_id: String,
    to_id: String,
    dv_m_s: f64,
    tof_s: f64,
}

impl From<EdgeRow> for TransferEdge {
    fn from(row: EdgeRow) -> Self {
        TransferEdge {
            from_id: LocationId(row.from_id),
            to_id: LocationId(row.to_id),
            dv_m_s: row.dv_m_s,
            tof_s: row.tof_s,
        }
    }
}

pub struct LocationBmc;

impl LocationBmc {
    pub async fn upsert_locations(
        conn: &mut SqliteConnection,
        rows: &[Location],
    ) -> Result<()> {
        for loc in rows {
            sqlx::query(
                r#"
insert into locations (id, name, parent_id, is_group, sort_order, x, y)
values (?1, ?2, ?3, ?4, ?5, ?6, ?7)
on conflict (id) do update set
  name = excluded.name,
  parent_id = excluded.parent_id,
  is_group = excluded.is_group,
  sort_order = excluded.sort_order,
  x = excluded.x,
  y = excluded.y
                "#,
            )
            .bind(&loc.id.0)
            .bind(&loc.name)
            .bind(loc.parent_id.as_ref().map(|p| p.0.as_str()))
            .bind(loc.is_group)
            .bind(loc.sort_order)
            .bind(loc.x)
            .bind(loc.y)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn upsert_transfer_edges(
        conn: &mut SqliteConnection,
        rows: &[TransferEdge],
    ) -> Result<()> {
        for edge in rows {
            sqlx::query(
                r#"
insert into transfer_edges (from_id, to_id, dv_m_s, tof_s)
values (?1, ?2, ?3, ?4)
on conflict (from_id, to_id) do update set
  dv_m_s = excluded.dv_m_s,
  tof_s = excluded.tof_s
                "#,
            )
            .bind(&edge.from_id.0)
            .bind(&edge.to_id.0)
            .bind(edge.dv_m_s)
            .bind(edge.tof_s)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn get(
        conn: &mut SqliteConnection,
        id: &LocationId,
    ) -> Result<Option<Location>> {
        let row = sqlx::query_as::<_, LocationRow>(
            "select id, name, parent_id, is_group, sort_order, x, y from locations where id = ?1",
        )
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.map(Location::from))
    }

    pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Location>> {
        let rows = sqlx::query_as::<_, LocationRow>(
            "select id, name, parent_id, is_group, sort_order, x, y from locations order by sort_order, name",
        )
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(Location::from).collect())
    }

    pub async fn count(conn: &mut SqliteConnection) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("select count(*) from locations")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count.0)
    }

    /// Routable node ids in sorted order; groups cannot host ships or edges.
    pub async fn non_group_ids(conn: &mut SqliteConnection) -> Result<Vec<LocationId>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("select id from locations where is_group = 0 order by id")
                .fetch_all(&mut *conn)
                .await?;
        Ok(rows.into_iter().map(|(id,)| LocationId(id)).collect())
    }

    pub async fn list_edges(conn: &mut SqliteConnection) -> Result<Vec<TransferEdge>> {
        let rows = sqlx::query_as::<_, EdgeRow>(
            "select from_id, to_id, dv_m_s, tof_s from transfer_edges order by from_id, to_id",
        )
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(TransferEdge::from).collect())
    }
}
