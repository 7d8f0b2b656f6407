use anyhow::Result;
use frontier_domain::{InventoryStack, ItemId, LocationId, StackKey, StackType};
use serde_json::Value;
use sqlx::SqliteConnection;
use std::str::FromStr;

/// Rows vanish once every component is at or below this.
pub const STACK_EPSILON: f64 = 1e-9;

#[derive(sqlx::FromRow)]
struct StackRow {
    location_id: String,
    stack_type: String,
    stack_key: String,
    item_id: String,
    name: String,
    quantity: f64,
    mass_kg: f64,
    volume_m3: f64,
    payload_json: String,
    updated_at: f64,
}

impl StackRow {
    fn into_stack(self) -> Result<InventoryStack> {
        Ok(InventoryStack {
            location_id: LocationId(self.location_id),
            stack_type: StackType::from_str(&self.stack_type)
                .map_err(|_| anyhow::anyhow!("unknown stack type '{}'", self.stack_type))?,
            stack_key: StackKey(self.stack_key),
            item_id: ItemId(self.item_id),
            name: self.name,
            quantity: self.quantity,
            mass_kg: self.mass_kg,
            volume_m3: self.volume_m3,
            payload: serde_json::from_str(&self.payload_json).unwrap_or(Value::Null),
            updated_at: self.updated_at,
        })
    }
}

/// One delta applied to a keyed stack. Quantities are signed; the upsert
/// clamps each component at zero and deletes the row when all three drain.
#[derive(Debug, Clone)]
pub struct StackDelta {
    pub location_id: LocationId,
    pub stack_type: StackType,
    pub stack_key: StackKey,
    pub item_id: ItemId,
    pub name: String,
    pub quantity: f64,
    pub mass_kg: f64,
    pub volume_m3: f64,
    pub payload: Value,
}

const STACK_COLUMNS: &str = "location_id, stack_type, stack_key, item_id, name, quantity, mass_kg, volume_m3, payload_json, updated_at";

pub struct InventoryBmc;

impl InventoryBmc {
    pub async fn get(
        conn: &mut SqliteConnection,
        location_id: &LocationId,
        stack_type: StackType,
        stack_key: &StackKey,
    ) -> Result<Option<InventoryStack>> {
        let row = sqlx::query_as::<_, StackRow>(&format!(
            "select {STACK_COLUMNS} from location_inventory_stacks where location_id = ?1 and stack_type = ?2 and stack_key = ?3"
        ))
        .bind(&location_id.0)
        .bind(stack_type.to_string())
        .bind(&stack_key.0)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(StackRow::into_stack).transpose()
    }

    pub async fn list_at(
        conn: &mut SqliteConnection,
        location_id: &LocationId,
    ) -> Result<Vec<InventoryStack>> {
        let rows = sqlx::query_as::<_, StackRow>(&format!(
            "select {STACK_COLUMNS} from location_inventory_stacks where location_id = ?1 order by stack_type, item_id, stack_key"
        ))
        .bind(&location_id.0)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(StackRow::into_stack).collect()
    }

    /// Part stacks at a location, oldest first within each item id. This is
    /// the consumption order for build requests.
    pub async fn list_part_stacks(
        conn: &mut SqliteConnection,
        location_id: &LocationId,
    ) -> Result<Vec<InventoryStack>> {
        let rows = sqlx::query_as::<_, StackRow>(&format!(
            "select {STACK_COLUMNS} from location_inventory_stacks where location_id = ?1 and stack_type = 'part' order by item_id, updated_at, stack_key"
        ))
        .bind(&location_id.0)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(StackRow::into_stack).collect()
    }

    /// Keyed upsert with clamp-at-zero semantics:
    /// absent + non-positive deltas is a no-op, absent + positive deltas
    /// inserts, present adds and clamps, and a fully drained row is deleted.
    pub async fn upsert(
        conn: &mut SqliteConnection,
        delta: &StackDelta,
        now_s: f64,
    ) -> Result<()> {
        let existing = Self::get(
            &mut *conn,
            &delta.location_id,
            delta.stack_type,
            &delta.stack_key,
        )
        .await?;

        match existing {
            None => {
                let qty = delta.quantity.max(0.0);
                let mass = delta.mass_kg.max(0.0);
                let vol = delta.volume_m3.max(0.0);
                if qty <= 0.0 && mass <= 0.0 && vol <= 0.0 {
                    return Ok(());
                }
                sqlx::query(
                    r#"
insert into location_inventory_stacks (
  location_id, stack_type, stack_key, item_id, name,
  quantity, mass_kg, volume_m3, payload_json, updated_at
) values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                )
                .bind(&delta.location_id.0)
                .bind(delta.stack_type.to_string())
                .bind(&delta.stack_key.0)
                .bind(&delta.item_id.0)
                .bind(&delta.name)
                .bind(qty)
                .bind(mass)
                .bind(vol)
                .bind(serde_json::to_string(&delta.payload)?)
                .bind(now_s)
                .execute(&mut *conn)
                .await?;
            }
            Some(row) => {
                let qty = (row.quantity + delta.quantity).max(0.0);
                let mass = (row.mass_kg + delta.mass_kg).max(0.0);
                let vol = (row.volume_m3 + delta.volume_m3).max(0.0);

                if qty <= STACK_EPSILON && mass <= STACK_EPSILON && vol <= STACK_EPSILON {
                    Self::delete(
                        &mut *conn,
                        &delta.location_id,
                        delta.stack_type,
                        &delta.stack_key,
                    )
                    .await?;
                    return Ok(());
                }

                sqlx::query(
                    r#"
update location_inventory_stacks
set item_id = ?4, name = ?5, quantity = ?6, mass_kg = ?7, volume_m3 = ?8,
    payload_json = ?9, updated_at = ?10
where location_id = ?1 and stack_type = ?2 and stack_key = ?3
                    "#,
                )
                .bind(&delta.location_id.0)
                .bind(delta.stack_type.to_string())
                .bind(&delta.stack_key.0)
                .bind(&delta.item_id.0)
                .bind(&delta.name)
                .bind(qty)
                .bind(mass)
                .bind(vol)
                .bind(serde_json::to_string(&delta.payload)?)
                .bind(now_s)
                .execute(&mut *conn)
                .await?;
            }
        }
        Ok(())
    }

    pub async fn delete(
        conn: &mut SqliteConnection,
        location_id: &LocationId,
        stack_type: StackType,
        stack_key: &StackKey,
    ) -> Result<()> {
        sqlx::query(
            "delete from location_inventory_stacks where location_id = ?1 and stack_type = ?2 and stack_key = ?3",
        )
        .bind(&location_id.0)
        .bind(stack_type.to_string())
        .bind(&stack_key.0)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use serde_json::json;

    fn water_delta(quantity: f64, mass_kg: f64, volume_m3: f64) -> StackDelta {
        StackDelta {
            location_id: LocationId("LEO".to_string()),
            stack_type: StackType::Resource,
            stack_key: StackKey("water".to_string()),
            item_id: ItemId("water".to_string()),
            name: "Water".to_string(),
            quantity,
            mass_kg,
            volume_m3,
            payload: json!({ "resource_id": "water" }),
        }
    }

    async fn water_stack(conn: &mut SqliteConnection) -> Option<InventoryStack> {
        InventoryBmc::get(
            conn,
            &LocationId("LEO".to_string()),
            StackType::Resource,
            &StackKey("water".to_string()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn absent_row_with_negative_deltas_is_a_no_op() {
        let pool = connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        InventoryBmc::upsert(&mut conn, &water_delta(-5.0, -5.0, -0.005), 100.0)
            .await
            .unwrap();
        assert!(water_stack(&mut conn).await.is_none());
    }

    #[tokio::test]
    async fn deltas_accumulate_clamp_and_delete() {
        let pool = connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        InventoryBmc::upsert(&mut conn, &water_delta(1_000.0, 1_000.0, 1.0), 100.0)
            .await
            .unwrap();
        InventoryBmc::upsert(&mut conn, &water_delta(500.0, 500.0, 0.5), 200.0)
            .await
            .unwrap();
        let row = water_stack(&mut conn).await.unwrap();
        assert_eq!(row.mass_kg, 1_500.0);
        assert_eq!(row.volume_m3, 1.5);
        assert_eq!(row.updated_at, 200.0);

        // over-debit clamps to zero rather than going negative, and a fully
        // drained row disappears
        InventoryBmc::upsert(&mut conn, &water_delta(-9_000.0, -9_000.0, -9.0), 300.0)
            .await
            .unwrap();
        assert!(water_stack(&mut conn).await.is_none());
    }

    #[tokio::test]
    async fn partial_debit_keeps_the_row() {
        let pool = connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        InventoryBmc::upsert(&mut conn, &water_delta(1_000.0, 1_000.0, 1.0), 100.0)
            .await
            .unwrap();
        InventoryBmc::upsert(&mut conn, &water_delta(-400.0, -400.0, -0.4), 200.0)
            .await
            .unwrap();
        let row = water_stack(&mut conn).await.unwrap();
        assert_eq!(row.quantity, 600.0);
        assert!((row.volume_m3 - 0.6).abs() < 1e-9);
    }
}
