use crate::category::ItemCategory;
use crate::ids::{ItemId, ResourceId};
use crate::model::Phase;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Legacy payload keys that carried a container's filled volume. The first
/// one present wins on read; all of them are written back on serialization.
pub const FILL_VOLUME_ALIASES: [&str; 5] = [
    "cargo_used_m3",
    "used_m3",
    "fill_m3",
    "stored_m3",
    "current_m3",
];

/// Legacy payload keys that carried a container's cargo mass.
pub const FILL_MASS_ALIASES: [&str; 6] = [
    "cargo_mass_kg",
    "contents_mass_kg",
    "stored_mass_kg",
    "current_mass_kg",
    "water_kg",
    "fuel_kg",
];

const CONSUMED_KEYS: [&str; 17] = [
    "item_id",
    "id",
    "name",
    "type",
    "category",
    "category_id",
    "mass_kg",
    "capacity_m3",
    "mass_per_m3_kg",
    "thrust_kn",
    "isp_s",
    "thermal_mw",
    "power_mw",
    "resource_id",
    "container_uid",
    "tank_phase",
    "branch",
];

/// Explicit container fill state. Exactly one of these lives on every
/// storage part; the legacy alias keys exist only in the serialized payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerFill {
    pub used_m3: f64,
    pub cargo_mass_kg: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageTank {
    /// Stable identity of this physical container. Empty until the
    /// normalizer assigns one.
    pub container_uid: String,
    pub resource_id: Option<ResourceId>,
    pub capacity_m3: f64,
    pub mass_per_m3_kg: f64,
    pub tank_phase: Option<Phase>,
    pub fill: Option<ContainerFill>,
}

impl StorageTank {
    pub fn capacity_kg(&self) -> f64 {
        self.capacity_m3 * self.mass_per_m3_kg
    }

    pub fn holds_resource(&self, resource: &str) -> bool {
        self.resource_id
            .as_ref()
            .is_some_and(|r| r.0.eq_ignore_ascii_case(resource))
    }
}

/// Category-specific part attributes. The open `extras` map on [`Part`]
/// carries anything the catalog grows in the future.
#[derive(Debug, Clone, PartialEq)]
pub enum PartKind {
    Thruster { thrust_kn: f64, isp_s: f64 },
    Reactor { thermal_mw: f64 },
    Generator { power_mw: f64 },
    Radiator { thermal_mw: f64 },
    Robonaut,
    Constructor,
    Refinery { branch: String },
    Storage(StorageTank),
    Generic,
}

impl PartKind {
    pub fn category(&self) -> ItemCategory {
        match self {
            PartKind::Thruster { .. } => ItemCategory::Thruster,
            PartKind::Reactor { .. } => ItemCategory::Reactor,
            PartKind::Generator { .. } => ItemCategory::Generator,
            PartKind::Radiator { .. } => ItemCategory::Radiator,
            PartKind::Robonaut => ItemCategory::Robonaut,
            PartKind::Constructor => ItemCategory::Constructor,
            PartKind::Refinery { .. } => ItemCategory::Refinery,
            PartKind::Storage(_) => ItemCategory::Storage,
            PartKind::Generic => ItemCategory::Generic,
        }
    }
}

/// A ship part or stocked component. Serialized form is the legacy flat
/// dictionary (including every fill alias key), so payloads stay readable
/// by anything that consumed the old wire shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub item_id: ItemId,
    pub name: String,
    pub mass_kg: f64,
    pub kind: PartKind,
    /// Unrecognized payload fields, preserved verbatim.
    pub extras: BTreeMap<String, Value>,
}

impl Part {
    pub fn category(&self) -> ItemCategory {
        self.kind.category()
    }

    pub fn is_storage(&self) -> bool {
        matches!(self.kind, PartKind::Storage(_))
    }

    pub fn storage(&self) -> Option<&StorageTank> {
        match &self.kind {
            PartKind::Storage(tank) => Some(tank),
            _ => None,
        }
    }

    pub fn storage_mut(&mut self) -> Option<&mut StorageTank> {
        match &mut self.kind {
            PartKind::Storage(tank) => Some(tank),
            _ => None,
        }
    }

    pub fn thrust_kn(&self) -> f64 {
        match self.kind {
            PartKind::Thruster { thrust_kn, .. } => thrust_kn,
            _ => 0.0,
        }
    }

    pub fn isp_s(&self) -> f64 {
        match self.kind {
            PartKind::Thruster { isp_s, .. } => isp_s,
            _ => 0.0,
        }
    }

    /// Parse the legacy flat-dictionary shape. Unknown keys are kept in
    /// `extras`; a positive `capacity_m3` forces the storage kind even when
    /// the category string says otherwise.
    pub fn from_payload(raw: &Value) -> Part {
        let obj = match raw.as_object() {
            Some(obj) => obj,
            None => {
                return Part {
                    item_id: ItemId("part".to_string()),
                    name: "Part".to_string(),
                    mass_kg: 0.0,
                    kind: PartKind::Generic,
                    extras: BTreeMap::new(),
                }
            }
        };

        let item_id = first_nonempty_str(obj, &["item_id", "id", "name", "type"])
            .unwrap_or_else(|| "part".to_string());
        let name = first_nonempty_str(obj, &["name"]).unwrap_or_else(|| item_id.clone());
        let raw_category = first_nonempty_str(obj, &["type", "category_id", "category"])
            .unwrap_or_default();
        let mut category = ItemCategory::canonical(&raw_category);
        let mass_kg = num(obj, "mass_kg").max(0.0);
        let capacity_m3 = num(obj, "capacity_m3").max(0.0);

        if capacity_m3 > 0.0 {
            category = ItemCategory::Storage;
        }

        let kind = match category {
            ItemCategory::Thruster => PartKind::Thruster {
                thrust_kn: num(obj, "thrust_kn").max(0.0),
                isp_s: num(obj, "isp_s").max(0.0),
            },
            ItemCategory::Reactor => PartKind::Reactor {
                thermal_mw: num(obj, "thermal_mw").max(0.0),
            },
            ItemCategory::Generator => PartKind::Generator {
                power_mw: num(obj, "power_mw").max(0.0),
            },
            ItemCategory::Radiator => PartKind::Radiator {
                thermal_mw: num(obj, "thermal_mw").max(0.0),
            },
            ItemCategory::Robonaut => PartKind::Robonaut,
            ItemCategory::Constructor => PartKind::Constructor,
            ItemCategory::Refinery => PartKind::Refinery {
                branch: first_nonempty_str(obj, &["branch"]).unwrap_or_default(),
            },
            ItemCategory::Storage => PartKind::Storage(parse_tank(obj, capacity_m3)),
            _ => PartKind::Generic,
        };

        let extras = obj
            .iter()
            .filter(|(k, _)| {
                !CONSUMED_KEYS.contains(&k.as_str())
                    && !FILL_VOLUME_ALIASES.contains(&k.as_str())
                    && !FILL_MASS_ALIASES.contains(&k.as_str())
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Part {
            item_id: ItemId(item_id),
            name,
            mass_kg,
            kind,
            extras,
        }
    }

    /// Serialize to the legacy flat dictionary. Fill state is fanned out to
    /// every alias key so older consumers keep working.
    pub fn to_payload(&self) -> Value {
        let mut obj = Map::new();
        for (k, v) in &self.extras {
            obj.insert(k.clone(), v.clone());
        }

        let category = self.category().to_string();
        obj.insert("item_id".to_string(), Value::String(self.item_id.0.clone()));
        obj.insert("name".to_string(), Value::String(self.name.clone()));
        obj.insert("type".to_string(), Value::String(category.clone()));
        obj.insert("category_id".to_string(), Value::String(category));
        obj.insert("mass_kg".to_string(), json_num(self.mass_kg));

        match &self.kind {
            PartKind::Thruster { thrust_kn, isp_s } => {
                obj.insert("thrust_kn".to_string(), json_num(*thrust_kn));
                obj.insert("isp_s".to_string(), json_num(*isp_s));
            }
            PartKind::Reactor { thermal_mw } | PartKind::Radiator { thermal_mw } => {
                obj.insert("thermal_mw".to_string(), json_num(*thermal_mw));
            }
            PartKind::Generator { power_mw } => {
                obj.insert("power_mw".to_string(), json_num(*power_mw));
            }
            PartKind::Refinery { branch } => {
                if !branch.is_empty() {
                    obj.insert("branch".to_string(), Value::String(branch.clone()));
                }
            }
            PartKind::Storage(tank) => {
                obj.insert(
                    "container_uid".to_string(),
                    Value::String(tank.container_uid.clone()),
                );
                obj.insert("capacity_m3".to_string(), json_num(tank.capacity_m3));
                obj.insert(
                    "mass_per_m3_kg".to_string(),
                    json_num(tank.mass_per_m3_kg),
                );
                if let Some(rid) = &tank.resource_id {
                    obj.insert("resource_id".to_string(), Value::String(rid.0.clone()));
                }
                if let Some(phase) = tank.tank_phase {
                    obj.insert(
                        "tank_phase".to_string(),
                        Value::String(phase.to_string()),
                    );
                }
                if let Some(fill) = tank.fill {
                    for key in FILL_VOLUME_ALIASES {
                        obj.insert(key.to_string(), json_num(fill.used_m3));
                    }
                    for key in FILL_MASS_ALIASES {
                        obj.insert(key.to_string(), json_num(fill.cargo_mass_kg));
                    }
                }
            }
            PartKind::Robonaut | PartKind::Constructor | PartKind::Generic => {}
        }

        Value::Object(obj)
    }
}

fn parse_tank(obj: &Map<String, Value>, capacity_m3: f64) -> StorageTank {
    let density = num(obj, "mass_per_m3_kg").max(0.0);
    let resource_id = first_nonempty_str(obj, &["resource_id"]).map(ResourceId);
    let tank_phase = first_nonempty_str(obj, &["tank_phase"])
        .and_then(|p| p.trim().to_lowercase().parse::<Phase>().ok());

    let explicit_m3 = FILL_VOLUME_ALIASES
        .iter()
        .find(|k| obj.contains_key(**k))
        .map(|k| num(obj, k).max(0.0));
    let explicit_mass = FILL_MASS_ALIASES
        .iter()
        .find(|k| obj.contains_key(**k))
        .map(|k| num(obj, k).max(0.0));

    let fill = match (explicit_m3, explicit_mass) {
        (None, None) => None,
        (m3, mass) => {
            let used_m3 = m3.unwrap_or_else(|| {
                let mass = mass.unwrap_or(0.0);
                if density > 0.0 {
                    mass / density
                } else {
                    0.0
                }
            });
            let cargo_mass_kg = mass.unwrap_or(used_m3 * density);
            Some(ContainerFill {
                used_m3,
                cargo_mass_kg,
            })
        }
    };

    StorageTank {
        container_uid: first_nonempty_str(obj, &["container_uid"]).unwrap_or_default(),
        resource_id,
        capacity_m3,
        mass_per_m3_kg: density,
        tank_phase,
        fill,
    }
}

fn first_nonempty_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        obj.get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn num(obj: &Map<String, Value>, key: &str) -> f64 {
    match obj.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn json_num(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

impl Serialize for Part {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_payload().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Part {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Err(D::Error::custom("part payload must be an object"));
        }
        Ok(Part::from_payload(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_roundtrip_is_stable() {
        let raw = json!({
            "item_id": "water_tank_10_m3",
            "name": "Water Tank",
            "type": "storage",
            "mass_kg": 500.0,
            "capacity_m3": 10.0,
            "mass_per_m3_kg": 1000.0,
            "resource_id": "water",
            "container_uid": "uid-1",
            "used_m3": 4.0,
            "custom_flag": true,
        });
        let part = Part::from_payload(&raw);
        let tank = part.storage().unwrap();
        assert_eq!(tank.container_uid, "uid-1");
        let fill = tank.fill.unwrap();
        assert_eq!(fill.used_m3, 4.0);
        assert_eq!(fill.cargo_mass_kg, 4000.0);
        assert_eq!(part.extras.get("custom_flag"), Some(&Value::Bool(true)));

        let reparsed = Part::from_payload(&part.to_payload());
        assert_eq!(reparsed, part);
    }

    #[test]
    fn capacity_forces_storage_kind() {
        let raw = json!({ "name": "Mystery Box", "capacity_m3": 2.0 });
        let part = Part::from_payload(&raw);
        assert!(part.is_storage());
        assert_eq!(part.category(), ItemCategory::Storage);
    }

    #[test]
    fn fill_aliases_read_in_priority_order() {
        let raw = json!({
            "type": "storage",
            "capacity_m3": 8.0,
            "mass_per_m3_kg": 1000.0,
            "cargo_used_m3": 3.0,
            "used_m3": 7.0,
        });
        let part = Part::from_payload(&raw);
        assert_eq!(part.storage().unwrap().fill.unwrap().used_m3, 3.0);
    }

    #[test]
    fn fill_fans_out_to_every_alias_on_write() {
        let raw = json!({
            "type": "storage",
            "capacity_m3": 8.0,
            "mass_per_m3_kg": 1000.0,
            "used_m3": 2.5,
        });
        let payload = Part::from_payload(&raw).to_payload();
        let obj = payload.as_object().unwrap();
        for key in FILL_VOLUME_ALIASES {
            assert_eq!(obj[key], json!(2.5), "missing alias {key}");
        }
        for key in FILL_MASS_ALIASES {
            assert_eq!(obj[key], json!(2500.0), "missing alias {key}");
        }
    }

    #[test]
    fn thruster_attributes_survive() {
        let raw = json!({
            "item_id": "ntr_m2",
            "type": "thruster",
            "mass_kg": 12000.0,
            "thrust_kn": 250.0,
            "isp_s": 900.0,
        });
        let part = Part::from_payload(&raw);
        assert_eq!(part.thrust_kn(), 250.0);
        assert_eq!(part.isp_s(), 900.0);
    }
}
