use anyhow::Result;
use frontier_domain::{LocationId, TransferMatrixEntry};
use sqlx::SqliteConnection;

#[derive(sqlx::FromRow)]
struct MatrixRow {
    from_id: String,
    to_id: String,
    dv_m_s: f64,
    tof_s: f64,
    path_json: String,
}

impl MatrixRow {
    fn into_entry(self) -> Result<TransferMatrixEntry> {
        let path: Vec<String> = serde_json::from_str(&self.path_json)?;
        Ok(TransferMatrixEntry {
            from_id: LocationId(self.from_id),
            to_id: LocationId(self.to_id),
            dv_m_s: self.dv_m_s,
            tof_s: self.tof_s,
            path: path.into_iter().map(LocationId).collect(),
        })
    }
}

pub struct MatrixBmc;

impl MatrixBmc {
    pub async fn clear(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query("delete from transfer_matrix")
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn insert_entries(
        conn: &mut SqliteConnection,
        entries: &[TransferMatrixEntry],
    ) -> Result<()> {
        for entry in entries {
            let path: Vec<&str> = entry.path.iter().map(|p| p.0.as_str()).collect();
            sqlx::query(
                r#"
insert into transfer_matrix (from_id, to_id, dv_m_s, tof_s, path_json)
values (?1, ?2, ?3, ?4, ?5)
on conflict (from_id, to_id) do update set
  dv_m_s = excluded.dv_m_s,
  tof_s = excluded.tof_s,
  path_json = excluded.path_json
                "#,
            )
            .bind(&entry.from_id.0)
            .bind(&entry.to_id.0)
            .bind(entry.dv_m_s)
            .bind(entry.tof_s)
            .bind(serde_json::to_string(&path)?)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn get(
        conn: &mut SqliteConnection,
        from: &LocationId,
        to: &LocationId,
    ) -> Result<Option<TransferMatrixEntry>> {
        let row = sqlx::query_as::<_, MatrixRow>(
            "select from_id, to_id, dv_m_s, tof_s, path_json from transfer_matrix where from_id = ?1 and to_id = ?2",
        )
        .bind(&from.0)
        .bind(&to.0)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(MatrixRow::into_entry).transpose()
    }

    pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<TransferMatrixEntry>> {
        let rows = sqlx::query_as::<_, MatrixRow>(
            "select from_id, to_id, dv_m_s, tof_s, path_json from transfer_matrix order by from_id, to_id",
        )
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(MatrixRow::into_entry).collect()
    }

    pub async fn count(conn: &mut SqliteConnection) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("select count(*) from transfer_matrix")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count.0)
    }

    pub async fn get_meta(conn: &mut SqliteConnection, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("select value from transfer_meta where key = ?1")
                .bind(key)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(row.map(|(value,)| value))
    }

    pub async fn set_meta(
        conn: &mut SqliteConnection,
        key: &str,
        value: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
insert into transfer_meta (key, value)
values (?1, ?2)
on conflict (key) do update set value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}
