use crate::ids::{ItemId, LocationId, OrgId, ResourceId, ShipId, StackKey, TeamId, TechId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub parent_id: Option<LocationId>,
    pub is_group: bool,
    pub sort_order: i64,
    /// Heliocentric plane position, km.
    pub x: f64,
    pub y: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TransferEdge {
    pub from_id: LocationId,
    pub to_id: LocationId,
    pub dv_m_s: f64,
    pub tof_s: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TransferMatrixEntry {
    pub from_id: LocationId,
    pub to_id: LocationId,
    pub dv_m_s: f64,
    pub tof_s: f64,
    /// Ordered hop list including both endpoints.
    pub path: Vec<LocationId>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LocationTreeNode {
    pub id: LocationId,
    pub name: String,
    pub is_group: bool,
    pub sort_order: i64,
    pub children: Vec<LocationTreeNode>,
}

#[derive(
    Deserialize,
    Serialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StackType {
    Resource,
    Part,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct InventoryStack {
    pub location_id: LocationId,
    pub stack_type: StackType,
    pub stack_key: StackKey,
    pub item_id: ItemId,
    pub name: String,
    pub quantity: f64,
    pub mass_kg: f64,
    pub volume_m3: f64,
    pub payload: Value,
    pub updated_at: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub balance_usd: f64,
    pub research_points: f64,
    pub last_settled_at: f64,
    pub created_at: f64,
}

#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TeamStatus {
    Active,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ResearchTeam {
    pub id: TeamId,
    pub org_id: OrgId,
    pub hired_at: f64,
    pub cost_per_month_usd: f64,
    pub points_per_week: f64,
    pub status: TeamStatus,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ResearchUnlock {
    pub org_id: OrgId,
    pub tech_id: TechId,
    pub unlocked_at: f64,
    pub cost_points: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LeoBoost {
    pub id: String,
    pub org_id: OrgId,
    pub item_id: ItemId,
    pub item_name: String,
    pub quantity: f64,
    pub mass_kg: f64,
    pub cost_usd: f64,
    pub boosted_at: f64,
    pub destination_location_id: LocationId,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SurfaceSite {
    pub location_id: LocationId,
    pub body_id: String,
    pub orbit_node_id: LocationId,
    pub gravity_m_s2: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SurfaceSiteResource {
    pub site_location_id: LocationId,
    pub resource_id: ResourceId,
    pub mass_fraction: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ProspectingResult {
    pub org_id: OrgId,
    pub site_location_id: LocationId,
    pub resource_id: ResourceId,
    pub mass_fraction: f64,
    pub prospected_at: f64,
    pub prospected_by_ship: ShipId,
}

/// Derived rocket-equation stats for a parts list plus current fuel load.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct ShipStats {
    pub dry_mass_kg: f64,
    pub fuel_capacity_kg: f64,
    pub fuel_kg: f64,
    pub isp_s: f64,
    pub thrust_kn: f64,
    pub wet_mass_kg: f64,
    pub acceleration_gs: f64,
    pub delta_v_remaining_m_s: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct BoostableItem {
    pub item_id: ItemId,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub mass_per_unit_kg: f64,
    pub tech_level: f64,
}

#[derive(
    Deserialize,
    Serialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Ord,
    PartialOrd,
    Display,
    EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Solid,
    Liquid,
    Gas,
}

const GAS_HINTS: [&str; 7] = [
    "helium",
    "hydrogen",
    "nitrogen",
    "oxygen",
    "argon",
    "methane",
    "deuterium",
];
const LIQUID_HINTS: [&str; 5] = ["water", "propellant", "hydrolox", "ammonia", "fuel"];

/// Classify a resource into solid/liquid/gas from name hints, falling back
/// to density thresholds (<200 kg/m3 gas, <2000 liquid, else solid).
pub fn classify_resource_phase(
    resource_id: &str,
    resource_name: &str,
    density_kg_m3: f64,
) -> Phase {
    let text = format!(
        "{} {}",
        resource_id.trim().to_lowercase(),
        resource_name.trim().to_lowercase()
    );

    if GAS_HINTS.iter().any(|h| text.contains(h)) {
        return Phase::Gas;
    }
    if LIQUID_HINTS.iter().any(|h| text.contains(h)) {
        return Phase::Liquid;
    }

    let d = density_kg_m3.max(0.0);
    if d > 0.0 {
        if d < 200.0 {
            return Phase::Gas;
        }
        if d < 2000.0 {
            return Phase::Liquid;
        }
    }
    Phase::Solid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_hints_beat_density() {
        assert_eq!(classify_resource_phase("water", "Water", 1000.0), Phase::Liquid);
        assert_eq!(classify_resource_phase("helium_3", "Helium-3", 5000.0), Phase::Gas);
    }

    #[test]
    fn density_thresholds_apply_without_hints() {
        assert_eq!(classify_resource_phase("x", "Mystery", 50.0), Phase::Gas);
        assert_eq!(classify_resource_phase("x", "Mystery", 900.0), Phase::Liquid);
        assert_eq!(classify_resource_phase("x", "Mystery", 3000.0), Phase::Solid);
        assert_eq!(classify_resource_phase("x", "Mystery", 0.0), Phase::Solid);
    }
}
