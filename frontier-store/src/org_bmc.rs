use anyhow::Result;
use frontier_domain::{
    ItemId, LeoBoost, LocationId, OrgId, Organization, ResearchTeam, ResearchUnlock, TeamId,
    TeamStatus, TechId,
};
use sqlx::SqliteConnection;
use std::str::FromStr;

#[derive(sqlx::FromRow)]
struct OrgRow {
    id: String,
    name: String,
    balance_usd: f64,
    research_points: f64,
    last_settled_at: f64,
    created_at: f64,
}

impl From<OrgRow> for Organization {
    fn from(row: OrgRow) -> Self {
        Organization {
            id: OrgId(row.id),
            name: row.name,
            balance_usd: row.balance_usd,
            research_points: row.research_points,
            last_settled_at: row.last_settled_at,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TeamRow {
    id: String,
    org_id: String,
    hired_at: f64,
    cost_per_month_usd: f64,
    points_per_week: f64,
    status: String,
}

impl TeamRow {
    fn into_team(self) -> Result<ResearchTeam> {
        Ok(ResearchTeam {
            id: TeamId(self.id),
            org_id: OrgId(self.org_id),
            hired_at: self.hired_at,
            cost_per_month_usd: self.cost_per_month_usd,
            points_per_week: self.points_per_week,
            status: TeamStatus::from_str(&self.status)
                .map_err(|_| anyhow::anyhow!("unknown team status '{}'", self.status))?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BoostRow {
    id: String,
    org_id: String,
    item_id: String,
    item_name: String,
    quantity: f64,
    mass_kg: f64,
    cost_usd: f64,
    boosted_at: f64,
    destination_location_id: String,
}

impl From<BoostRow> for LeoBoost {
    fn from(row: BoostRow) -> Self {
        LeoBoost {
            id: row.id,
            org_id: OrgId(row.org_id),
            item_id: ItemId(row.item_id),
            item_name: row.item_name,
            quantity: row.quantity,
            mass_kg: row.mass_kg,
            cost_usd: row.cost_usd,
            boosted_at: row.boosted_at,
            destination_location_id: LocationId(row.destination_location_id),
        }
    }
}

pub struct OrgBmc;

impl OrgBmc {
    pub async fn insert(conn: &mut SqliteConnection, org: &Organization) -> Result<()> {
        sqlx::query(
            r#"
insert into organizations (id, name, balance_usd, research_points, last_settled_at, created_at)
values (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&org.id.0)
        .bind(&org.name)
        .bind(org.balance_usd)
        .bind(org.research_points)
        .bind(org.last_settled_at)
        .bind(org.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get(
        conn: &mut SqliteConnection,
        id: &OrgId,
    ) -> Result<Option<Organization>> {
        let row = sqlx::query_as::<_, OrgRow>(
            "select id, name, balance_usd, research_points, last_settled_at, created_at from organizations where id = ?1",
        )
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.map(Organization::from))
    }

    pub async fn org_id_for_user(
        conn: &mut SqliteConnection,
        username: &str,
    ) -> Result<Option<OrgId>> {
        let row: Option<(String,)> =
            sqlx::query_as("select org_id from org_members where username = ?1")
                .bind(username)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(row.map(|(id,)| OrgId(id)))
    }

    pub async fn add_member(
        conn: &mut SqliteConnection,
        username: &str,
        org_id: &OrgId,
    ) -> Result<()> {
        sqlx::query(
            r#"
insert into org_members (username, org_id)
values (?1, ?2)
on conflict (username) do update set org_id = excluded.org_id
            "#,
        )
        .bind(username)
        .bind(&org_id.0)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn members(conn: &mut SqliteConnection, org_id: &OrgId) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "select username from org_members where org_id = ?1 order by username",
        )
        .bind(&org_id.0)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(|(u,)| u).collect())
    }

    pub async fn update_settlement(
        conn: &mut SqliteConnection,
        id: &OrgId,
        balance_usd: f64,
        research_points: f64,
        last_settled_at: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
update organizations
set balance_usd = ?2, research_points = ?3, last_settled_at = ?4
where id = ?1
            "#,
        )
        .bind(&id.0)
        .bind(balance_usd)
        .bind(research_points)
        .bind(last_settled_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn adjust_balance(
        conn: &mut SqliteConnection,
        id: &OrgId,
        delta_usd: f64,
    ) -> Result<()> {
        sqlx::query("update organizations set balance_usd = balance_usd + ?2 where id = ?1")
            .bind(&id.0)
            .bind(delta_usd)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn adjust_research_points(
        conn: &mut SqliteConnection,
        id: &OrgId,
        delta_points: f64,
    ) -> Result<()> {
        sqlx::query(
            "update organizations set research_points = research_points + ?2 where id = ?1",
        )
        .bind(&id.0)
        .bind(delta_points)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    // -- research teams

    pub async fn insert_team(conn: &mut SqliteConnection, team: &ResearchTeam) -> Result<()> {
        sqlx::query(
            r#"
insert into research_teams (id, org_id, hired_at, cost_per_month_usd, points_per_week, status)
values (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&team.id.0)
        .bind(&team.org_id.0)
        .bind(team.hired_at)
        .bind(team.cost_per_month_usd)
        .bind(team.points_per_week)
        .bind(team.status.to_string())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn list_teams(
        conn: &mut SqliteConnection,
        org_id: &OrgId,
    ) -> Result<Vec<ResearchTeam>> {
        let rows = sqlx::query_as::<_, TeamRow>(
            "select id, org_id, hired_at, cost_per_month_usd, points_per_week, status from research_teams where org_id = ?1 order by hired_at, id",
        )
        .bind(&org_id.0)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(TeamRow::into_team).collect()
    }

    pub async fn active_team_count(
        conn: &mut SqliteConnection,
        org_id: &OrgId,
    ) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "select count(*) from research_teams where org_id = ?1 and status = 'active'",
        )
        .bind(&org_id.0)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count.0)
    }

    pub async fn delete_team(
        conn: &mut SqliteConnection,
        org_id: &OrgId,
        team_id: &TeamId,
    ) -> Result<bool> {
        let result = sqlx::query("delete from research_teams where id = ?1 and org_id = ?2")
            .bind(&team_id.0)
            .bind(&org_id.0)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -- research unlocks

    pub async fn has_unlock(
        conn: &mut SqliteConnection,
        org_id: &OrgId,
        tech_id: &TechId,
    ) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "select 1 from research_unlocks where org_id = ?1 and tech_id = ?2",
        )
        .bind(&org_id.0)
        .bind(&tech_id.0)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.is_some())
    }

    pub async fn list_unlocks(
        conn: &mut SqliteConnection,
        org_id: &OrgId,
    ) -> Result<Vec<ResearchUnlock>> {
        let rows: Vec<(String, f64, f64)> = sqlx::query_as(
            "select tech_id, unlocked_at, cost_points from research_unlocks where org_id = ?1 order by unlocked_at, tech_id",
        )
        .bind(&org_id.0)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(tech_id, unlocked_at, cost_points)| ResearchUnlock {
                org_id: org_id.clone(),
                tech_id: TechId(tech_id),
                unlocked_at,
                cost_points,
            })
            .collect())
    }

    pub async fn insert_unlock(
        conn: &mut SqliteConnection,
        unlock: &ResearchUnlock,
    ) -> Result<()> {
        sqlx::query(
            r#"
insert into research_unlocks (org_id, tech_id, unlocked_at, cost_points)
values (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&unlock.org_id.0)
        .bind(&unlock.tech_id.0)
        .bind(unlock.unlocked_at)
        .bind(unlock.cost_points)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    // -- LEO boost ledger

    pub async fn insert_boost(conn: &mut SqliteConnection, boost: &LeoBoost) -> Result<()> {
        sqlx::query(
            r#"
insert into leo_boosts (
  id, org_id, item_id, item_name, quantity, mass_kg, cost_usd, boosted_at, destination_location_id
) values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&boost.id)
        .bind(&boost.org_id.0)
        .bind(&boost.item_id.0)
        .bind(&boost.item_name)
        .bind(boost.quantity)
        .bind(boost.mass_kg)
        .bind(boost.cost_usd)
        .bind(boost.boosted_at)
        .bind(&boost.destination_location_id.0)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn boost_history(
        conn: &mut SqliteConnection,
        org_id: &OrgId,
        limit: i64,
    ) -> Result<Vec<LeoBoost>> {
        let rows = sqlx::query_as::<_, BoostRow>(
            r#"
select id, org_id, item_id, item_name, quantity, mass_kg, cost_usd, boosted_at, destination_location_id
from leo_boosts
where org_id = ?1
order by boosted_at desc
limit ?2
            "#,
        )
        .bind(&org_id.0)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(LeoBoost::from).collect())
    }
}
