use anyhow::Result;
use frontier_domain::{LocationId, Part, Ship, ShipId, Transit};
use sqlx::SqliteConnection;

#[derive(sqlx::FromRow)]
struct ShipRow {
    id: String,
    name: String,
    shape: String,
    color: String,
    size_px: i64,
    notes_json: String,
    location_id: Option<String>,
    from_location_id: Option<String>,
    to_location_id: Option<String>,
    departed_at: Option<f64>,
    arrives_at: Option<f64>,
    transfer_path_json: String,
    parts_json: String,
    fuel_kg: f64,
    fuel_capacity_kg: f64,
    dry_mass_kg: f64,
    isp_s: f64,
}

const SHIP_COLUMNS: &str = r#"id, name, shape, color, size_px, notes_json,
  location_id, from_location_id, to_location_id, departed_at, arrives_at,
  transfer_path_json, parts_json, fuel_kg, fuel_capacity_kg, dry_mass_kg, isp_s"#;

impl ShipRow {
    fn into_ship(self) -> Result<Ship> {
        let notes: Vec<String> = serde_json::from_str(&self.notes_json).unwrap_or_default();
        let parts: Vec<Part> = serde_json::from_str(&self.parts_json)?;
        let path: Vec<String> =
            serde_json::from_str(&self.transfer_path_json).unwrap_or_default();

        let transit = match (
            self.from_location_id,
            self.to_location_id,
            self.departed_at,
            self.arrives_at,
        ) {
            (Some(from), Some(to), Some(departed_at), Some(arrives_at)) => Some(Transit {
                from_location_id: LocationId(from),
                to_location_id: LocationId(to),
                departed_at,
                arrives_at,
                path: path.into_iter().map(LocationId).collect(),
            }),
            _ => None,
        };

        Ok(Ship {
            id: ShipId(self.id),
            name: self.name,
            shape: self.shape,
            color: self.color,
            size_px: self.size_px,
            notes,
            location_id: self.location_id.map(LocationId),
            transit,
            parts,
            fuel_kg: self.fuel_kg,
            fuel_capacity_kg: self.fuel_capacity_kg,
            dry_mass_kg: self.dry_mass_kg,
            isp_s: self.isp_s,
        })
    }
}

pub struct ShipBmc;

impl ShipBmc {
    pub async fn get(conn: &mut SqliteConnection, id: &ShipId) -> Result<Option<Ship>> {
        let row = sqlx::query_as::<_, ShipRow>(&format!(
            "select {SHIP_COLUMNS} from ships where id = ?1"
        ))
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(ShipRow::into_ship).transpose()
    }

    pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Ship>> {
        let rows = sqlx::query_as::<_, ShipRow>(&format!(
            "select {SHIP_COLUMNS} from ships order by name, id"
        ))
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(ShipRow::into_ship).collect()
    }

    pub async fn exists(conn: &mut SqliteConnection, id: &ShipId) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("select 1 from ships where id = ?1")
            .bind(&id.0)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.is_some())
    }

    pub async fn insert(conn: &mut SqliteConnection, ship: &Ship) -> Result<()> {
        let (from, to, departed_at, arrives_at, path) = transit_columns(ship);
        sqlx::query(
            r#"
insert into ships (
  id, name, shape, color, size_px, notes_json,
  location_id, from_location_id, to_location_id, departed_at, arrives_at,
  transfer_path_json, parts_json, fuel_kg, fuel_capacity_kg, dry_mass_kg, isp_s
) values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&ship.id.0)
        .bind(&ship.name)
        .bind(&ship.shape)
        .bind(&ship.color)
        .bind(ship.size_px)
        .bind(serde_json::to_string(&ship.notes)?)
        .bind(ship.location_id.as_ref().map(|l| l.0.as_str()))
        .bind(from)
        .bind(to)
        .bind(departed_at)
        .bind(arrives_at)
        .bind(path)
        .bind(serde_json::to_string(&ship.parts)?)
        .bind(ship.fuel_kg)
        .bind(ship.fuel_capacity_kg)
        .bind(ship.dry_mass_kg)
        .bind(ship.isp_s)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Persist parts and the stats derived from them.
    pub async fn update_loadout(
        conn: &mut SqliteConnection,
        id: &ShipId,
        parts: &[Part],
        fuel_kg: f64,
        fuel_capacity_kg: f64,
        dry_mass_kg: f64,
        isp_s: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
update ships
set parts_json = ?2, fuel_kg = ?3, fuel_capacity_kg = ?4, dry_mass_kg = ?5, isp_s = ?6
where id = ?1
            "#,
        )
        .bind(&id.0)
        .bind(serde_json::to_string(parts)?)
        .bind(fuel_kg)
        .bind(fuel_capacity_kg)
        .bind(dry_mass_kg)
        .bind(isp_s)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Move a docked ship into transit, debiting the burn's fuel.
    pub async fn set_in_transit(
        conn: &mut SqliteConnection,
        id: &ShipId,
        transit: &Transit,
        fuel_kg_after: f64,
    ) -> Result<()> {
        let path: Vec<&str> = transit.path.iter().map(|p| p.0.as_str()).collect();
        sqlx::query(
            r#"
update ships
set location_id = null,
    from_location_id = ?2,
    to_location_id = ?3,
    departed_at = ?4,
    arrives_at = ?5,
    transfer_path_json = ?6,
    fuel_kg = ?7
where id = ?1
            "#,
        )
        .bind(&id.0)
        .bind(&transit.from_location_id.0)
        .bind(&transit.to_location_id.0)
        .bind(transit.departed_at)
        .bind(transit.arrives_at)
        .bind(serde_json::to_string(&path)?)
        .bind(fuel_kg_after)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Promote every ship whose arrival time has passed to docked at its
    /// destination. Idempotent; returns the number of ships settled.
    pub async fn settle_arrivals(conn: &mut SqliteConnection, now_s: f64) -> Result<u64> {
        let result = sqlx::query(
            r#"
update ships
set location_id = to_location_id,
    from_location_id = null,
    to_location_id = null,
    departed_at = null,
    arrives_at = null,
    transfer_path_json = '[]'
where arrives_at is not null and arrives_at <= ?1
            "#,
        )
        .bind(now_s)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(conn: &mut SqliteConnection, id: &ShipId) -> Result<()> {
        sqlx::query("delete from ships where id = ?1")
            .bind(&id.0)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Drop leftovers from automated test runs.
    pub async fn purge_test_ships(conn: &mut SqliteConnection) -> Result<u64> {
        let result = sqlx::query(
            "delete from ships where id like 'test_%' or lower(name) like 'test[%'",
        )
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }
}

fn transit_columns(
    ship: &Ship,
) -> (
    Option<&str>,
    Option<&str>,
    Option<f64>,
    Option<f64>,
    String,
) {
    match &ship.transit {
        Some(t) => {
            let path: Vec<&str> = t.path.iter().map(|p| p.0.as_str()).collect();
            (
                Some(t.from_location_id.0.as_str()),
                Some(t.to_location_id.0.as_str()),
                Some(t.departed_at),
                Some(t.arrives_at),
                serde_json::to_string(&path).unwrap_or_else(|_| "[]".to_string()),
            )
        }
        None => (None, None, None, None, "[]".to_string()),
    }
}
