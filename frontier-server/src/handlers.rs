use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use frontier_core::sim_clock::GameClock as _;
use frontier_core::{
    boost, economy, graph, inventory, parts, prospecting, router, shipyard, sim_clock, transit,
};
use frontier_domain::{GameError, ItemId, LocationId, OrgId, ShipId, TeamId, TechId};
use frontier_store::{Ctx, LocationBmc};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{Sqlite, Transaction};

fn acting_user(state: &AppState, headers: &HeaderMap) -> ApiResult<Ctx> {
    let header_user = headers
        .get("x-username")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(user) = header_user {
        return Ok(Ctx::for_user(user));
    }
    if state.dev_skip_auth {
        return Ok(Ctx::for_user("dev"));
    }
    Err(ApiError(GameError::validation(
        "missing x-username header",
    )))
}

async fn org_for_request(
    state: &AppState,
    tx: &mut Transaction<'static, Sqlite>,
    headers: &HeaderMap,
) -> ApiResult<OrgId> {
    let ctx = acting_user(state, headers)?;
    Ok(economy::ensure_org_for_user(tx, state.clock.as_ref(), &ctx).await?)
}

// -- locations

pub async fn locations(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let locations = LocationBmc::list(&mut tx).await?;
    tx.commit().await?;
    Ok(Json(json!({
        "locations": locations,
        "game_time_s": state.clock.now_s(),
    })))
}

pub async fn locations_tree(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let locations = LocationBmc::list(&mut tx).await?;
    tx.commit().await?;
    Ok(Json(json!({ "tree": graph::build_location_tree(&locations) })))
}

#[derive(Deserialize)]
pub struct RouteQuery {
    pub from: String,
    pub to: String,
}

pub async fn route(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let entry = router::route(
        &mut tx,
        &LocationId(query.from),
        &LocationId(query.to),
    )
    .await?;
    tx.commit().await?;
    Ok(Json(json!({ "route": entry })))
}

// -- fleet

pub async fn fleet_state(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let now = state.clock.now_s();
    let mut tx = state.mm.begin().await?;
    let ships = shipyard::fleet_state(&mut tx, &state.registry, now).await?;
    tx.commit().await?;
    Ok(Json(json!({ "ships": ships, "game_time_s": now })))
}

pub async fn ship_detail(
    State(state): State<AppState>,
    Path(ship_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    transit::settle_arrivals(&mut tx, state.clock.now_s()).await?;
    let view = shipyard::load_ship_view(&mut tx, &state.registry, &ShipId(ship_id)).await?;
    tx.commit().await?;
    Ok(Json(json!({ "ship": view })))
}

#[derive(Deserialize)]
pub struct DispatchRequest {
    pub to_location_id: String,
}

pub async fn dispatch(
    State(state): State<AppState>,
    Path(ship_id): Path<String>,
    Json(body): Json<DispatchRequest>,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let ship = transit::dispatch(
        &mut tx,
        state.clock.as_ref(),
        &ShipId(ship_id),
        &LocationId(body.to_location_id),
    )
    .await?;
    tx.commit().await?;
    Ok(Json(json!({ "ok": true, "ship": ship })))
}

#[derive(Deserialize)]
pub struct ProspectRequest {
    pub site_location_id: String,
}

pub async fn prospect(
    State(state): State<AppState>,
    Path(ship_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ProspectRequest>,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let org_id = org_for_request(&state, &mut tx, &headers).await?;
    let report = prospecting::prospect(
        &mut tx,
        state.clock.as_ref(),
        &org_id,
        &ShipId(ship_id),
        &LocationId(body.site_location_id),
    )
    .await?;
    tx.commit().await?;
    Ok(Json(json!({ "ok": true, "report": report })))
}

#[derive(Deserialize)]
pub struct DeconstructRequest {
    #[serde(default)]
    pub keep_ship_record: bool,
}

pub async fn deconstruct(
    State(state): State<AppState>,
    Path(ship_id): Path<String>,
    Json(body): Json<DeconstructRequest>,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let report = shipyard::deconstruct_ship(
        &mut tx,
        state.clock.as_ref(),
        &state.registry,
        &ShipId(ship_id),
        body.keep_ship_record,
    )
    .await?;
    tx.commit().await?;
    Ok(Json(json!({ "ok": true, "report": report })))
}

// -- inventory

pub async fn inventory_at(
    State(state): State<AppState>,
    Path(location_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let location_id = LocationId(location_id);
    shipyard::require_buildable_location(&mut tx, &location_id).await?;
    let payload = inventory::location_inventory(&mut tx, &location_id).await?;
    tx.commit().await?;
    Ok(Json(json!(payload)))
}

// -- surface sites

pub async fn surface_sites(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let org_id = org_for_request(&state, &mut tx, &headers).await?;
    let sites = prospecting::surface_sites_for_org(&mut tx, &org_id).await?;
    tx.commit().await?;
    Ok(Json(json!({ "surface_sites": sites })))
}

pub async fn surface_site_detail(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let org_id = org_for_request(&state, &mut tx, &headers).await?;
    let site =
        prospecting::surface_site_for_org(&mut tx, &org_id, &LocationId(site_id)).await?;
    tx.commit().await?;
    Ok(Json(json!(site)))
}

// -- org & economy

pub async fn org(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let org_id = org_for_request(&state, &mut tx, &headers).await?;
    let profile = economy::org_profile(&mut tx, state.clock.as_ref(), &org_id).await?;
    tx.commit().await?;
    Ok(Json(json!({ "org": profile })))
}

pub async fn hire_team(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let org_id = org_for_request(&state, &mut tx, &headers).await?;
    let team = economy::hire_research_team(&mut tx, state.clock.as_ref(), &org_id).await?;
    tx.commit().await?;
    Ok(Json(json!({ "ok": true, "team": team })))
}

#[derive(Deserialize)]
pub struct FireTeamRequest {
    pub team_id: String,
}

pub async fn fire_team(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<FireTeamRequest>,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let org_id = org_for_request(&state, &mut tx, &headers).await?;
    economy::fire_research_team(&mut tx, &org_id, &TeamId(body.team_id.clone())).await?;
    tx.commit().await?;
    Ok(Json(json!({ "ok": true, "fired": body.team_id })))
}

#[derive(Deserialize)]
pub struct UnlockTechRequest {
    pub tech_id: String,
    pub cost_points: f64,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

pub async fn unlock_tech(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UnlockTechRequest>,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let org_id = org_for_request(&state, &mut tx, &headers).await?;
    let prereqs: Vec<TechId> = body.prerequisites.into_iter().map(TechId).collect();
    let unlock = economy::unlock_tech(
        &mut tx,
        state.clock.as_ref(),
        &org_id,
        &TechId(body.tech_id),
        body.cost_points,
        &prereqs,
    )
    .await?;
    tx.commit().await?;
    Ok(Json(json!({ "ok": true, "unlock": unlock })))
}

pub async fn unlocked_techs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let org_id = org_for_request(&state, &mut tx, &headers).await?;
    let unlocks = economy::unlocked_techs(&mut tx, &org_id).await?;
    tx.commit().await?;
    Ok(Json(json!({ "unlocks": unlocks })))
}

// -- boost

pub async fn boostable_items(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let org_id = org_for_request(&state, &mut tx, &headers).await?;
    let items = boost::boostable_items(&mut tx, &state.registry, &org_id).await?;
    tx.commit().await?;
    Ok(Json(json!({
        "items": items,
        "base_cost_usd": boost::LEO_BOOST_BASE_COST_USD,
        "cost_per_kg_usd": boost::LEO_BOOST_COST_PER_KG_USD,
    })))
}

#[derive(Deserialize)]
pub struct BoostCostRequest {
    pub mass_kg: f64,
}

pub async fn boost_cost(Json(body): Json<BoostCostRequest>) -> Json<Value> {
    Json(json!({ "cost_usd": boost::calculate_boost_cost(body.mass_kg) }))
}

#[derive(Deserialize)]
pub struct BoostRequest {
    pub item_id: String,
    pub quantity: f64,
}

pub async fn boost_to_leo(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BoostRequest>,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let org_id = org_for_request(&state, &mut tx, &headers).await?;
    let receipt = boost::boost(
        &mut tx,
        state.clock.as_ref(),
        &state.registry,
        &org_id,
        &ItemId(body.item_id),
        body.quantity,
    )
    .await?;
    tx.commit().await?;
    let destination = receipt.destination_location_id.clone();
    Ok(Json(json!({
        "ok": true,
        "boost": receipt,
        "destination": destination,
    })))
}

pub async fn boost_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let org_id = org_for_request(&state, &mut tx, &headers).await?;
    let history = boost::boost_history(&mut tx, &org_id, 20).await?;
    tx.commit().await?;
    Ok(Json(json!({ "boosts": history })))
}

pub async fn prospected_sites(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let org_id = org_for_request(&state, &mut tx, &headers).await?;
    let sites = prospecting::prospected_sites(&mut tx, &org_id).await?;
    tx.commit().await?;
    Ok(Json(json!({ "prospected_sites": sites })))
}

// -- shipyard

pub async fn shipyard_catalog(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let mut tx = state.mm.begin().await?;
    let catalog = shipyard::shipyard_catalog(&mut tx, &state.registry).await?;
    tx.commit().await?;
    Ok(Json(json!(catalog)))
}

#[derive(Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub parts: Value,
    pub source_location_id: String,
    #[serde(default)]
    pub current_fuel_kg: Option<f64>,
}

pub async fn shipyard_preview(
    State(state): State<AppState>,
    Json(body): Json<PreviewRequest>,
) -> ApiResult<Json<Value>> {
    let item_ids = parts::normalize_shipyard_item_ids(&body.parts);
    let mut tx = state.mm.begin().await?;
    let stats = shipyard::preview(
        &mut tx,
        &state.registry,
        &item_ids,
        &LocationId(body.source_location_id),
        body.current_fuel_kg,
    )
    .await?;
    tx.commit().await?;
    Ok(Json(json!({ "stats": stats })))
}

#[derive(Deserialize)]
pub struct BuildRequest {
    pub name: String,
    #[serde(default)]
    pub parts: Value,
    pub source_location_id: String,
}

pub async fn shipyard_build(
    State(state): State<AppState>,
    Json(body): Json<BuildRequest>,
) -> ApiResult<Json<Value>> {
    let item_ids = parts::normalize_shipyard_item_ids(&body.parts);
    let mut tx = state.mm.begin().await?;
    let ship = shipyard::build_ship(
        &mut tx,
        state.clock.as_ref(),
        &state.registry,
        &body.name,
        &item_ids,
        &LocationId(body.source_location_id),
    )
    .await?;
    tx.commit().await?;
    Ok(Json(json!({ "ok": true, "ship": ship })))
}

// -- simulation clock

pub async fn sim_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "game_time_s": state.clock.now_s(),
        "paused": state.clock.paused(),
        "scale": state.clock.scale(),
        "effective_scale": state.clock.effective_scale(),
    }))
}

#[derive(Deserialize)]
pub struct PauseRequest {
    pub paused: bool,
}

pub async fn sim_pause(
    State(state): State<AppState>,
    Json(body): Json<PauseRequest>,
) -> ApiResult<Json<Value>> {
    state.clock.set_paused(body.paused);
    let mut tx = state.mm.begin().await?;
    sim_clock::persist_clock_state(&mut tx, state.clock.as_ref()).await?;
    tx.commit().await?;
    Ok(Json(json!({
        "ok": true,
        "paused": state.clock.paused(),
        "game_time_s": state.clock.now_s(),
    })))
}

pub async fn sim_reset(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.clock.reset();
    let mut tx = state.mm.begin().await?;
    sim_clock::persist_clock_state(&mut tx, state.clock.as_ref()).await?;
    tx.commit().await?;
    Ok(Json(json!({
        "ok": true,
        "game_time_s": state.clock.now_s(),
    })))
}
