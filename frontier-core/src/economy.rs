use crate::sim_clock::GameClock;
use anyhow::Result;
use frontier_domain::{
    GameError, GameResult, OrgId, Organization, ResearchTeam, ResearchUnlock, TeamId, TeamStatus,
    TechId,
};
use frontier_store::{Ctx, OrgBmc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

pub const MONTHLY_INCOME_USD: f64 = 1_000_000_000.0;
pub const GAME_MONTH_SECONDS: f64 = 30.0 * 24.0 * 3600.0;
pub const GAME_WEEK_SECONDS: f64 = 7.0 * 24.0 * 3600.0;

pub const RESEARCH_TEAM_COST_PER_MONTH: f64 = 150_000_000.0;
pub const RESEARCH_TEAM_POINTS_PER_WEEK: f64 = 5.0;

/// Org state plus the derived listings the client shows alongside it.
#[derive(Serialize, Debug, Clone)]
pub struct OrgProfile {
    #[serde(flatten)]
    pub org: Organization,
    pub members: Vec<String>,
    pub research_teams: Vec<ResearchTeam>,
    pub income_per_month_usd: f64,
    pub team_cost_per_month_usd: f64,
    pub team_points_per_week: f64,
}

/// Resolve (or lazily create) the org for the acting user. New orgs start
/// with one month of income banked.
pub async fn ensure_org_for_user(
    conn: &mut SqliteConnection,
    clock: &dyn GameClock,
    ctx: &Ctx,
) -> GameResult<OrgId> {
    let username = ctx
        .username()
        .ok_or_else(|| GameError::validation("no acting user in context"))?;

    if let Some(org_id) = OrgBmc::org_id_for_user(&mut *conn, username).await? {
        return Ok(org_id);
    }

    let now = clock.now_s();
    let org = Organization {
        id: OrgId(Uuid::new_v4().to_string()),
        name: format!("{username}'s Organization"),
        balance_usd: MONTHLY_INCOME_USD,
        research_points: 0.0,
        last_settled_at: now,
        created_at: now,
    };
    OrgBmc::insert(&mut *conn, &org).await?;
    OrgBmc::add_member(&mut *conn, username, &org.id).await?;
    info!(org = %org.id, user = username, "created personal organization");
    Ok(org.id)
}

/// Settle-on-access: fold elapsed virtual time into balance and research
/// points, then advance the settlement cursor. Reading balance or points
/// without going through here first is a bug.
pub async fn settle_org(
    conn: &mut SqliteConnection,
    clock: &dyn GameClock,
    org_id: &OrgId,
) -> GameResult<Organization> {
    let now = clock.now_s();
    let org = OrgBmc::get(&mut *conn, org_id)
        .await?
        .ok_or_else(|| GameError::not_found(format!("organization '{org_id}'")))?;

    let elapsed_s = (now - org.last_settled_at).max(0.0);
    if elapsed_s <= 0.0 {
        return Ok(org);
    }

    let months = elapsed_s / GAME_MONTH_SECONDS;
    let weeks = elapsed_s / GAME_WEEK_SECONDS;
    let team_count = OrgBmc::active_team_count(&mut *conn, org_id).await? as f64;

    let income = months * MONTHLY_INCOME_USD;
    let team_costs = team_count * RESEARCH_TEAM_COST_PER_MONTH * months;
    let research_gained = team_count * RESEARCH_TEAM_POINTS_PER_WEEK * weeks;

    let balance = org.balance_usd + income - team_costs;
    let points = org.research_points + research_gained;
    OrgBmc::update_settlement(&mut *conn, org_id, balance, points, now).await?;

    Ok(Organization {
        balance_usd: balance,
        research_points: points,
        last_settled_at: now,
        ..org
    })
}

pub async fn org_profile(
    conn: &mut SqliteConnection,
    clock: &dyn GameClock,
    org_id: &OrgId,
) -> GameResult<OrgProfile> {
    let org = settle_org(&mut *conn, clock, org_id).await?;
    let members = OrgBmc::members(&mut *conn, org_id).await?;
    let research_teams = OrgBmc::list_teams(&mut *conn, org_id).await?;
    Ok(OrgProfile {
        org,
        members,
        research_teams,
        income_per_month_usd: MONTHLY_INCOME_USD,
        team_cost_per_month_usd: RESEARCH_TEAM_COST_PER_MONTH,
        team_points_per_week: RESEARCH_TEAM_POINTS_PER_WEEK,
    })
}

/// Hire a research team; the first month is paid immediately.
pub async fn hire_research_team(
    conn: &mut SqliteConnection,
    clock: &dyn GameClock,
    org_id: &OrgId,
) -> GameResult<ResearchTeam> {
    let org = settle_org(&mut *conn, clock, org_id).await?;
    if org.balance_usd < RESEARCH_TEAM_COST_PER_MONTH {
        return Err(GameError::InsufficientFunds {
            need: RESEARCH_TEAM_COST_PER_MONTH,
            have: org.balance_usd,
        });
    }

    let team = ResearchTeam {
        id: TeamId(Uuid::new_v4().to_string()),
        org_id: org_id.clone(),
        hired_at: clock.now_s(),
        cost_per_month_usd: RESEARCH_TEAM_COST_PER_MONTH,
        points_per_week: RESEARCH_TEAM_POINTS_PER_WEEK,
        status: TeamStatus::Active,
    };
    OrgBmc::insert_team(&mut *conn, &team).await?;
    OrgBmc::adjust_balance(&mut *conn, org_id, -RESEARCH_TEAM_COST_PER_MONTH).await?;
    Ok(team)
}

/// Dismiss a team. Non-settling: accrual up to this instant belongs to the
/// next settle call.
pub async fn fire_research_team(
    conn: &mut SqliteConnection,
    org_id: &OrgId,
    team_id: &TeamId,
) -> GameResult<()> {
    let removed = OrgBmc::delete_team(&mut *conn, org_id, team_id).await?;
    if !removed {
        return Err(GameError::not_found(format!("research team '{team_id}'")));
    }
    Ok(())
}

/// Unlock a tech-tree node, debiting research points. Prerequisites must
/// already be unlocked for this org.
pub async fn unlock_tech(
    conn: &mut SqliteConnection,
    clock: &dyn GameClock,
    org_id: &OrgId,
    tech_id: &TechId,
    cost_points: f64,
    prerequisites: &[TechId],
) -> GameResult<ResearchUnlock> {
    let org = settle_org(&mut *conn, clock, org_id).await?;

    if OrgBmc::has_unlock(&mut *conn, org_id, tech_id).await? {
        return Err(GameError::AlreadyUnlocked(tech_id.clone()));
    }

    let mut missing = Vec::new();
    for prereq in prerequisites {
        if !OrgBmc::has_unlock(&mut *conn, org_id, prereq).await? {
            missing.push(prereq.clone());
        }
    }
    if !missing.is_empty() {
        return Err(GameError::PrereqMissing { missing });
    }

    if org.research_points < cost_points {
        return Err(GameError::InsufficientPoints {
            need: cost_points,
            have: org.research_points,
        });
    }

    let unlock = ResearchUnlock {
        org_id: org_id.clone(),
        tech_id: tech_id.clone(),
        unlocked_at: clock.now_s(),
        cost_points,
    };
    OrgBmc::adjust_research_points(&mut *conn, org_id, -cost_points).await?;
    OrgBmc::insert_unlock(&mut *conn, &unlock).await?;
    info!(org = %org_id, tech = %tech_id, cost = cost_points, "tech unlocked");
    Ok(unlock)
}

pub async fn unlocked_techs(
    conn: &mut SqliteConnection,
    org_id: &OrgId,
) -> Result<Vec<ResearchUnlock>> {
    OrgBmc::list_unlocks(conn, org_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim_clock::FakeClock;
    use frontier_store::connect_in_memory;

    async fn org_with_balance(
        conn: &mut sqlx::SqliteConnection,
        balance: f64,
        now: f64,
    ) -> OrgId {
        let org = Organization {
            id: OrgId("org-1".to_string()),
            name: "Test Org".to_string(),
            balance_usd: balance,
            research_points: 0.0,
            last_settled_at: now,
            created_at: now,
        };
        OrgBmc::insert(conn, &org).await.unwrap();
        org.id
    }

    #[tokio::test]
    async fn one_month_with_one_team_accrues_income_and_points() {
        let pool = connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let clock = FakeClock::at(0.0);
        let org_id = org_with_balance(&mut conn, 0.0, 0.0).await;

        OrgBmc::insert_team(
            &mut conn,
            &ResearchTeam {
                id: TeamId("team-1".to_string()),
                org_id: org_id.clone(),
                hired_at: 0.0,
                cost_per_month_usd: RESEARCH_TEAM_COST_PER_MONTH,
                points_per_week: RESEARCH_TEAM_POINTS_PER_WEEK,
                status: TeamStatus::Active,
            },
        )
        .await
        .unwrap();

        clock.advance(GAME_MONTH_SECONDS);
        let org = settle_org(&mut conn, &clock, &org_id).await.unwrap();

        assert!((org.balance_usd - 850_000_000.0).abs() < 1.0);
        // one month = 30/7 weeks at 5 points/week
        let expected_points = 30.0 / 7.0 * 5.0;
        assert!((org.research_points - expected_points).abs() < 1e-6);
    }

    #[tokio::test]
    async fn settling_twice_is_a_no_op() {
        let pool = connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let clock = FakeClock::at(0.0);
        let org_id = org_with_balance(&mut conn, 0.0, 0.0).await;

        clock.advance(GAME_MONTH_SECONDS);
        let first = settle_org(&mut conn, &clock, &org_id).await.unwrap();
        let second = settle_org(&mut conn, &clock, &org_id).await.unwrap();
        assert_eq!(first.balance_usd, second.balance_usd);
        assert_eq!(first.research_points, second.research_points);
        assert_eq!(second.last_settled_at, clock.now_s());
    }

    #[tokio::test]
    async fn hiring_requires_funds_and_debits_them() {
        let pool = connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let clock = FakeClock::at(0.0);
        let org_id = org_with_balance(&mut conn, 100.0, 0.0).await;

        let err = hire_research_team(&mut conn, &clock, &org_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InsufficientFunds { .. }));

        OrgBmc::adjust_balance(&mut conn, &org_id, 200_000_000.0)
            .await
            .unwrap();
        hire_research_team(&mut conn, &clock, &org_id).await.unwrap();
        let org = OrgBmc::get(&mut conn, &org_id).await.unwrap().unwrap();
        assert!((org.balance_usd - 50_000_100.0).abs() < 1.0);
        assert_eq!(OrgBmc::active_team_count(&mut conn, &org_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unlock_enforces_prereqs_points_and_uniqueness() {
        let pool = connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let clock = FakeClock::at(0.0);
        let org_id = org_with_balance(&mut conn, 0.0, 0.0).await;
        OrgBmc::adjust_research_points(&mut conn, &org_id, 100.0)
            .await
            .unwrap();

        let t1 = TechId("thrusters_lvl_1".to_string());
        let t2 = TechId("thrusters_lvl_2".to_string());

        let err = unlock_tech(&mut conn, &clock, &org_id, &t2, 10.0, &[t1.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PrereqMissing { .. }));

        unlock_tech(&mut conn, &clock, &org_id, &t1, 10.0, &[])
            .await
            .unwrap();
        let err = unlock_tech(&mut conn, &clock, &org_id, &t1, 10.0, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::AlreadyUnlocked(_)));

        let err = unlock_tech(&mut conn, &clock, &org_id, &t2, 1_000.0, &[t1.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InsufficientPoints { .. }));

        unlock_tech(&mut conn, &clock, &org_id, &t2, 50.0, &[t1])
            .await
            .unwrap();
        let org = OrgBmc::get(&mut conn, &org_id).await.unwrap().unwrap();
        assert!((org.research_points - 40.0).abs() < 1e-9);
    }
}
