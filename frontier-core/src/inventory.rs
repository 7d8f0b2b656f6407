use crate::catalog::CatalogRegistry;
use crate::parts::{normalize_part, normalize_parts};
use anyhow::Result;
use frontier_domain::{
    classify_resource_phase, GameError, GameResult, InventoryStack, ItemId, LocationId, Part,
    Phase, ResourceId, StackKey, StackType,
};
use frontier_store::{InventoryBmc, StackDelta};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha1::{Digest, Sha1};
use sqlx::SqliteConnection;
use std::collections::{BTreeMap, HashMap};

/// Canonical JSON used for content hashing: compact separators, sorted
/// object keys (serde_json maps are ordered), shortest-roundtrip floats.
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Structural identity of a part stack: normalize, wrap, hash. Parts that
/// normalize to the same shape share a stack; any semantic difference
/// (including container state) yields a distinct key.
pub fn part_stack_identity(
    registry: &CatalogRegistry,
    raw: &Value,
) -> (StackKey, ItemId, String, Value) {
    let part = normalize_part(registry, raw);
    let payload = json!({ "part": part.to_payload() });
    let digest = Sha1::digest(canonical_json(&payload).as_bytes());
    let stack_key = StackKey(hex_string(&digest));
    let name = part.name.clone();
    (stack_key, part.item_id.clone(), name, payload)
}

pub(crate) fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().fold(String::new(), |mut out, byte| {
        use std::fmt::Write as _;
        let _ = write!(out, "{byte:02x}");
        out
    })
}

/// Credit a resource stack. Volume follows mass through the catalog density.
pub async fn add_resource_to_location(
    conn: &mut SqliteConnection,
    registry: &CatalogRegistry,
    location_id: &LocationId,
    resource_id: &ResourceId,
    mass_kg: f64,
    now_s: f64,
) -> Result<()> {
    let amount_kg = mass_kg.max(0.0);
    if resource_id.0.trim().is_empty() || amount_kg <= 0.0 {
        return Ok(());
    }

    let record = registry.resource(&resource_id.0);
    let name = record
        .map(|r| r.name_or(&resource_id.0))
        .unwrap_or_else(|| resource_id.0.clone());
    let density = registry.resource_density_kg_m3(&resource_id.0);
    let volume = if density > 0.0 { amount_kg / density } else { 0.0 };

    InventoryBmc::upsert(
        conn,
        &StackDelta {
            location_id: location_id.clone(),
            stack_type: StackType::Resource,
            stack_key: StackKey(resource_id.0.clone()),
            item_id: ItemId(resource_id.0.clone()),
            name,
            quantity: amount_kg,
            mass_kg: amount_kg,
            volume_m3: volume,
            payload: json!({ "resource_id": resource_id.0 }),
        },
        now_s,
    )
    .await
}

pub async fn add_part_to_location(
    conn: &mut SqliteConnection,
    registry: &CatalogRegistry,
    location_id: &LocationId,
    part: &Part,
    count: f64,
    now_s: f64,
) -> Result<()> {
    let qty = count.max(0.0);
    if qty <= 0.0 {
        return Ok(());
    }

    let (stack_key, item_id, name, payload) = part_stack_identity(registry, &part.to_payload());
    let mass_per_part = part.mass_kg.max(0.0);

    InventoryBmc::upsert(
        conn,
        &StackDelta {
            location_id: location_id.clone(),
            stack_type: StackType::Part,
            stack_key,
            item_id,
            name,
            quantity: qty,
            mass_kg: mass_per_part * qty,
            volume_m3: 0.0,
            payload,
        },
        now_s,
    )
    .await
}

/// Debit up to `mass_request` kg from a resource stack, reducing volume
/// proportionally. Returns the mass actually consumed.
pub async fn consume_resource_mass(
    conn: &mut SqliteConnection,
    location_id: &LocationId,
    stack_key: &StackKey,
    mass_request_kg: f64,
    now_s: f64,
) -> GameResult<f64> {
    let row = InventoryBmc::get(conn, location_id, StackType::Resource, stack_key)
        .await?
        .ok_or_else(|| GameError::not_found(format!("resource stack '{stack_key}'")))?;

    let available = row.mass_kg.max(0.0);
    let amount = mass_request_kg.max(0.0).min(available);
    if amount <= 0.0 {
        return Ok(0.0);
    }

    let volume_delta = if available > 1e-9 {
        -(row.volume_m3.max(0.0) * (amount / available))
    } else {
        0.0
    };

    InventoryBmc::upsert(
        conn,
        &StackDelta {
            location_id: row.location_id.clone(),
            stack_type: StackType::Resource,
            stack_key: row.stack_key.clone(),
            item_id: row.item_id.clone(),
            name: row.name.clone(),
            quantity: -amount,
            mass_kg: -amount,
            volume_m3: volume_delta,
            payload: row.payload.clone(),
        },
        now_s,
    )
    .await?;
    Ok(amount)
}

/// Debit exactly one unit from a part stack and return the normalized part.
pub async fn consume_part_unit(
    conn: &mut SqliteConnection,
    registry: &CatalogRegistry,
    location_id: &LocationId,
    stack_key: &StackKey,
    now_s: f64,
) -> GameResult<Part> {
    let row = InventoryBmc::get(conn, location_id, StackType::Part, stack_key)
        .await?
        .ok_or_else(|| GameError::not_found(format!("part stack '{stack_key}'")))?;
    consume_part_unit_from_row(conn, registry, &row, now_s).await
}

async fn consume_part_unit_from_row(
    conn: &mut SqliteConnection,
    registry: &CatalogRegistry,
    row: &InventoryStack,
    now_s: f64,
) -> GameResult<Part> {
    let qty_before = row.quantity.max(0.0);
    if qty_before < 1.0 {
        return Err(GameError::validation("part stack is empty"));
    }

    let raw_part = row
        .payload
        .get("part")
        .cloned()
        .unwrap_or_else(|| json!({ "item_id": row.item_id.0, "name": row.name, "mass_kg": row.mass_kg / qty_before }));
    let part = normalize_part(registry, &raw_part);

    // per-unit mass from the stack itself; unit-scale stacks fall back to
    // the part's own mass
    let unit_mass = if qty_before > 1e-9 {
        row.mass_kg.max(0.0) / qty_before
    } else {
        part.mass_kg.max(0.0)
    };
    let unit_volume = if qty_before > 1e-9 {
        row.volume_m3.max(0.0) / qty_before
    } else {
        0.0
    };

    InventoryBmc::upsert(
        conn,
        &StackDelta {
            location_id: row.location_id.clone(),
            stack_type: StackType::Part,
            stack_key: row.stack_key.clone(),
            item_id: row.item_id.clone(),
            name: row.name.clone(),
            quantity: -1.0,
            mass_kg: -unit_mass,
            volume_m3: -unit_volume,
            payload: row.payload.clone(),
        },
        now_s,
    )
    .await?;

    Ok(part)
}

/// Consume one part per entry of `requested`, validating aggregate
/// availability per item id before touching anything. Within an item id,
/// the oldest stack with a whole unit is drained first.
pub async fn consume_parts_by_item_ids(
    conn: &mut SqliteConnection,
    registry: &CatalogRegistry,
    location_id: &LocationId,
    requested: &[ItemId],
    now_s: f64,
) -> GameResult<Vec<Part>> {
    let requested: Vec<ItemId> = requested
        .iter()
        .filter(|id| !id.0.trim().is_empty())
        .cloned()
        .collect();
    if requested.is_empty() {
        return Ok(Vec::new());
    }

    let stacks = InventoryBmc::list_part_stacks(conn, location_id).await?;
    let mut by_item: HashMap<ItemId, Vec<InventoryStack>> = HashMap::new();
    for stack in stacks {
        by_item.entry(stack.item_id.clone()).or_default().push(stack);
    }

    let needed = requested.iter().counts();
    for (&item_id, &need) in &needed {
        let have = by_item
            .get(item_id)
            .map(|stacks| stacks.iter().map(|s| s.quantity.max(0.0)).sum::<f64>())
            .unwrap_or(0.0)
            .floor() as usize;
        if have < need {
            return Err(GameError::InsufficientInventory {
                location: location_id.clone(),
                item: item_id.clone(),
                need: need as u32,
                have: have as u32,
            });
        }
    }

    let mut consumed = Vec::with_capacity(requested.len());
    for item_id in &requested {
        let stacks = by_item.entry(item_id.clone()).or_default();
        let chosen_key = stacks
            .iter()
            .find(|s| s.quantity >= 1.0)
            .map(|s| s.stack_key.clone())
            .ok_or_else(|| GameError::InventoryRace(item_id.clone()))?;

        // re-read inside the transaction: a prior debit in this very loop
        // may have drained the row
        let row = InventoryBmc::get(conn, location_id, StackType::Part, &chosen_key)
            .await?
            .ok_or_else(|| GameError::InventoryRace(item_id.clone()))?;
        if row.quantity < 1.0 {
            return Err(GameError::InventoryRace(item_id.clone()));
        }

        consumed.push(consume_part_unit_from_row(conn, registry, &row, now_s).await?);

        // mirror the debit in our working copy
        for stack in stacks.iter_mut() {
            if stack.stack_key == chosen_key {
                stack.quantity -= 1.0;
            }
        }
        stacks.retain(|s| s.quantity > 1e-9);
    }

    Ok(consumed)
}

// -- location inventory payloads

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResourceStackView {
    pub stack_key: StackKey,
    pub resource_id: ResourceId,
    pub item_id: ItemId,
    pub name: String,
    pub quantity: f64,
    pub mass_kg: f64,
    pub volume_m3: f64,
    pub updated_at: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PartStackView {
    pub stack_key: StackKey,
    pub item_id: ItemId,
    pub name: String,
    pub quantity: f64,
    pub mass_kg: f64,
    pub volume_m3: f64,
    pub updated_at: f64,
    pub part: Option<Part>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LocationInventory {
    pub location_id: LocationId,
    pub resources: Vec<ResourceStackView>,
    pub parts: Vec<PartStackView>,
}

pub async fn location_inventory(
    conn: &mut SqliteConnection,
    location_id: &LocationId,
) -> Result<LocationInventory> {
    let stacks = InventoryBmc::list_at(conn, location_id).await?;

    let mut resources = Vec::new();
    let mut parts = Vec::new();
    for stack in stacks {
        match stack.stack_type {
            StackType::Resource => {
                let resource_id = stack
                    .payload
                    .get("resource_id")
                    .and_then(Value::as_str)
                    .unwrap_or(&stack.item_id.0)
                    .to_string();
                resources.push(ResourceStackView {
                    stack_key: stack.stack_key,
                    resource_id: ResourceId(resource_id),
                    item_id: stack.item_id,
                    name: stack.name,
                    quantity: stack.quantity,
                    mass_kg: stack.mass_kg,
                    volume_m3: stack.volume_m3,
                    updated_at: stack.updated_at,
                });
            }
            StackType::Part => {
                let part = stack.payload.get("part").map(Part::from_payload);
                parts.push(PartStackView {
                    stack_key: stack.stack_key,
                    item_id: stack.item_id,
                    name: stack.name,
                    quantity: stack.quantity,
                    mass_kg: stack.mass_kg,
                    volume_m3: stack.volume_m3,
                    updated_at: stack.updated_at,
                    part,
                });
            }
        }
    }

    Ok(LocationInventory {
        location_id: location_id.clone(),
        resources,
        parts,
    })
}

// -- on-ship container rollups (derived, never stored as inventory rows)

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ContainerRow {
    pub container_index: usize,
    pub container_uid: String,
    pub name: String,
    pub resource_id: String,
    pub resource_name: String,
    pub phase: Phase,
    pub capacity_m3: f64,
    pub used_m3: f64,
    pub density_kg_m3: f64,
    pub cargo_mass_kg: f64,
    pub dry_mass_kg: f64,
    pub total_mass_kg: f64,
}

pub fn ship_containers(registry: &CatalogRegistry, parts: &[Part]) -> Vec<ContainerRow> {
    let mut rows = Vec::new();

    for (idx, part) in parts.iter().enumerate() {
        let tank = match part.storage() {
            Some(tank) => tank,
            None => continue,
        };

        let resource_id = tank
            .resource_id
            .as_ref()
            .map(|r| r.0.clone())
            .unwrap_or_default();
        let resource = registry.resource(&resource_id);
        let resource_name = resource
            .map(|r| r.name_or(&resource_id))
            .unwrap_or_else(|| {
                if resource_id.is_empty() {
                    "Unknown resource".to_string()
                } else {
                    resource_id.clone()
                }
            });
        let density = if tank.mass_per_m3_kg > 0.0 {
            tank.mass_per_m3_kg
        } else {
            registry.resource_density_kg_m3(&resource_id)
        };

        let (used_m3, cargo_mass_kg) = match tank.fill {
            Some(fill) if fill.used_m3 > 0.0 => {
                let used = if tank.capacity_m3 > 0.0 {
                    fill.used_m3.min(tank.capacity_m3)
                } else {
                    fill.used_m3
                };
                let mass = if density > 0.0 {
                    used * density
                } else {
                    fill.cargo_mass_kg.max(0.0)
                };
                (used, mass)
            }
            Some(fill) if fill.cargo_mass_kg > 0.0 && density > 0.0 => {
                let used_unclamped = fill.cargo_mass_kg / density;
                let used = if tank.capacity_m3 > 0.0 {
                    used_unclamped.min(tank.capacity_m3)
                } else {
                    used_unclamped
                };
                (used, fill.cargo_mass_kg)
            }
            _ => (0.0, 0.0),
        };

        let phase = tank
            .tank_phase
            .unwrap_or_else(|| classify_resource_phase(&resource_id, &resource_name, density));

        rows.push(ContainerRow {
            container_index: idx,
            container_uid: tank.container_uid.clone(),
            name: part.name.clone(),
            resource_id,
            resource_name,
            phase,
            capacity_m3: tank.capacity_m3.max(0.0),
            used_m3,
            density_kg_m3: density,
            cargo_mass_kg,
            dry_mass_kg: part.mass_kg.max(0.0),
            total_mass_kg: part.mass_kg.max(0.0) + cargo_mass_kg,
        });
    }

    rows
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ShipResourceRollup {
    pub resource_id: ResourceId,
    pub label: String,
    pub phase: Phase,
    pub mass_kg: f64,
    pub volume_m3: f64,
    pub quantity: f64,
}

/// Sum container cargo per resource. The rollup is the ship-side analogue
/// of a location's resource stacks, computed on demand.
pub fn ship_resource_rollup(containers: &[ContainerRow]) -> Vec<ShipResourceRollup> {
    let mut by_resource: BTreeMap<String, ShipResourceRollup> = BTreeMap::new();

    for container in containers {
        if container.resource_id.is_empty() {
            continue;
        }
        if container.cargo_mass_kg <= 1e-9 && container.used_m3 <= 1e-9 {
            continue;
        }

        let entry = by_resource
            .entry(container.resource_id.clone())
            .or_insert_with(|| ShipResourceRollup {
                resource_id: ResourceId(container.resource_id.clone()),
                label: container.resource_name.clone(),
                phase: container.phase,
                mass_kg: 0.0,
                volume_m3: 0.0,
                quantity: 0.0,
            });
        entry.mass_kg += container.cargo_mass_kg.max(0.0);
        entry.volume_m3 += container.used_m3.max(0.0);
        entry.quantity += container.cargo_mass_kg.max(0.0);
    }

    by_resource
        .into_values()
        .sorted_by(|a, b| (a.phase, a.label.clone()).cmp(&(b.phase, b.label.clone())))
        .collect()
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default)]
pub struct PhaseCapacity {
    pub used_m3: f64,
    pub capacity_m3: f64,
    pub free_m3: f64,
    pub utilization: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CapacitySummary {
    pub used_m3: f64,
    pub capacity_m3: f64,
    pub free_m3: f64,
    pub utilization: f64,
    pub by_phase: BTreeMap<Phase, PhaseCapacity>,
}

pub fn capacity_summary(containers: &[ContainerRow]) -> CapacitySummary {
    let mut by_phase: BTreeMap<Phase, PhaseCapacity> = BTreeMap::new();
    for phase in [Phase::Solid, Phase::Liquid, Phase::Gas] {
        by_phase.insert(phase, PhaseCapacity::default());
    }

    for container in containers {
        let entry = by_phase.entry(container.phase).or_default();
        entry.capacity_m3 += container.capacity_m3;
        entry.used_m3 += container.used_m3.min(container.capacity_m3);
    }

    let mut total_capacity = 0.0;
    let mut total_used = 0.0;
    for entry in by_phase.values_mut() {
        entry.free_m3 = (entry.capacity_m3 - entry.used_m3).max(0.0);
        entry.utilization = if entry.capacity_m3 > 1e-9 {
            entry.used_m3 / entry.capacity_m3
        } else {
            0.0
        };
        total_capacity += entry.capacity_m3;
        total_used += entry.used_m3;
    }

    CapacitySummary {
        used_m3: total_used,
        capacity_m3: total_capacity,
        free_m3: (total_capacity - total_used).max(0.0),
        utilization: if total_capacity > 1e-9 {
            total_used / total_capacity
        } else {
            0.0
        },
        by_phase,
    }
}
