use crate::catalog::CatalogRegistry;
use frontier_domain::{ItemId, Part};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Canonicalize a heterogeneous parts list: resolve catalog records, fill
/// missing fields from them, and guarantee every storage part a stable
/// `container_uid`. Idempotent over its own output.
pub fn normalize_parts(registry: &CatalogRegistry, raw_parts: &[Value]) -> Vec<Part> {
    raw_parts
        .iter()
        .map(|raw| normalize_part(registry, raw))
        .collect()
}

pub fn normalize_part(registry: &CatalogRegistry, raw: &Value) -> Part {
    let mut merged: Map<String, Value> = raw.as_object().cloned().unwrap_or_default();

    let item_id = resolve_item_id(&merged);
    if let Some((kind, record)) = registry.lookup_part(&ItemId(item_id.clone())) {
        for (key, value) in record.fields() {
            if is_missing(&merged, key) {
                merged.insert(key.clone(), value.clone());
            }
        }
        if is_missing(&merged, "type") && is_missing(&merged, "category_id") {
            merged.insert(
                "type".to_string(),
                Value::String(kind.category().to_string()),
            );
        }
        if is_missing(&merged, "item_id") {
            merged.insert("item_id".to_string(), Value::String(item_id));
        }
    }

    let mut part = Part::from_payload(&Value::Object(merged));

    if let Some(tank) = part.storage_mut() {
        if tank.container_uid.trim().is_empty() {
            tank.container_uid = Uuid::new_v4().to_string();
        }
        if tank.mass_per_m3_kg <= 0.0 {
            if let Some(rid) = tank.resource_id.clone() {
                tank.mass_per_m3_kg = registry.resource_density_kg_m3(&rid.0);
            }
        }
    }

    part
}

/// Re-run normalization over already-typed parts; used after edits that
/// may have introduced raw payload material.
pub fn renormalize(registry: &CatalogRegistry, parts: &[Part]) -> Vec<Part> {
    parts
        .iter()
        .map(|part| normalize_part(registry, &part.to_payload()))
        .collect()
}

/// Shipyard build requests name parts by item id; tolerate both bare
/// strings and `{"item_id": ...}` objects.
pub fn normalize_shipyard_item_ids(raw: &Value) -> Vec<ItemId> {
    let entries = match raw.as_array() {
        Some(entries) => entries,
        None => return Vec::new(),
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(obj) => obj
                .get("item_id")
                .or_else(|| obj.get("id"))
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .map(ItemId)
        .collect()
}

/// Build a parts list from catalog item ids alone.
pub fn parts_from_item_ids(registry: &CatalogRegistry, item_ids: &[ItemId]) -> Vec<Part> {
    item_ids
        .iter()
        .map(|id| {
            let raw = serde_json::json!({ "item_id": id.0 });
            normalize_part(registry, &raw)
        })
        .collect()
}

fn resolve_item_id(obj: &Map<String, Value>) -> String {
    ["item_id", "id", "name", "type"]
        .iter()
        .find_map(|key| {
            obj.get(*key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or("part")
        .to_string()
}

fn is_missing(obj: &Map<String, Value>, key: &str) -> bool {
    matches!(obj.get(key), None | Some(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use frontier_domain::ItemCategory;
    use serde_json::json;

    #[test]
    fn bare_item_id_is_enriched_from_catalog() {
        let registry = CatalogRegistry::builtin();
        let part = normalize_part(&registry, &json!({ "item_id": "ntr_m2_dumbo_folded_flow" }));
        assert_eq!(part.category(), ItemCategory::Thruster);
        assert_eq!(part.thrust_kn(), 250.0);
        assert_eq!(part.isp_s(), 900.0);
        assert_eq!(part.mass_kg, 2500.0);
        assert_eq!(part.name, "NTR M2 Dumbo (Folded Flow)");
    }

    #[test]
    fn explicit_fields_win_over_catalog() {
        let registry = CatalogRegistry::builtin();
        let part = normalize_part(
            &registry,
            &json!({ "item_id": "ntr_m1_kiwi", "mass_kg": 1234.0 }),
        );
        assert_eq!(part.mass_kg, 1234.0);
        assert_eq!(part.isp_s(), 830.0);
    }

    #[test]
    fn storage_parts_get_a_container_uid() {
        let registry = CatalogRegistry::builtin();
        let part = normalize_part(&registry, &json!({ "item_id": "water_tank_10_m3" }));
        let tank = part.storage().unwrap();
        assert!(!tank.container_uid.is_empty());
        assert_eq!(tank.mass_per_m3_kg, 1000.0);
        assert!(tank.holds_resource("water"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let registry = CatalogRegistry::builtin();
        let first = normalize_parts(
            &registry,
            &[
                json!({ "item_id": "ntr_m2_dumbo_folded_flow" }),
                json!({ "item_id": "water_tank_10_m3" }),
                json!({ "name": "Radiator", "type": "radiator", "mass_kg": 2000.0 }),
            ],
        );
        let second = renormalize(&registry, &first);
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_parts_stay_generic_but_stable() {
        let registry = CatalogRegistry::builtin();
        let part = normalize_part(
            &registry,
            &json!({ "name": "Mystery Widget", "mass_kg": 10.0 }),
        );
        assert_eq!(part.category(), ItemCategory::Generic);
        assert_eq!(part.item_id.0, "Mystery Widget");
        let again = normalize_part(&registry, &part.to_payload());
        assert_eq!(part, again);
    }

    #[test]
    fn item_id_list_parsing_accepts_both_shapes() {
        let ids = normalize_shipyard_item_ids(&json!([
            "ntr_m1_kiwi",
            { "item_id": "water_tank_10_m3" },
            "",
            42,
        ]));
        assert_eq!(
            ids,
            vec![
                ItemId("ntr_m1_kiwi".to_string()),
                ItemId("water_tank_10_m3".to_string()),
            ]
        );
    }
}
