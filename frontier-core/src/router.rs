use crate::inventory::hex_string;
use anyhow::Result;
use frontier_domain::{GameError, GameResult, LocationId, TransferEdge, TransferMatrixEntry};
use frontier_store::{LocationBmc, MatrixBmc};
use ordered_float::OrderedFloat;
use pathfinding::directed::dijkstra::{build_path, dijkstra_all};
use serde_json::json;
use sha2::{Digest, Sha256};
use sqlx::SqliteConnection;
use std::collections::HashMap;
use tracing::info;

pub const EDGES_HASH_META_KEY: &str = "edges_hash";

/// Content hash of the full edge set, in (from, to) order. The matrix is
/// valid exactly as long as this matches the stored meta row.
pub fn hash_edges(edges: &[TransferEdge]) -> String {
    let encoded: Vec<_> = edges
        .iter()
        .map(|e| {
            json!({
                "from_id": e.from_id.0,
                "to_id": e.to_id.0,
                "dv_m_s": e.dv_m_s,
                "tof_s": e.tof_s,
            })
        })
        .collect();
    let blob = serde_json::to_string(&encoded).unwrap_or_default();
    hex_string(&Sha256::digest(blob.as_bytes()))
}

/// All-pairs least-Δv paths over the non-group nodes. Δv is the minimized
/// weight; ToF is carried along the chosen path, not minimized itself.
/// Entries come out in sorted (from, to) order so regeneration is
/// bit-stable for a given edge set.
pub fn compute_transfer_matrix(
    node_ids: &[LocationId],
    edges: &[TransferEdge],
) -> Vec<TransferMatrixEntry> {
    let mut adjacency: HashMap<&LocationId, Vec<(&LocationId, f64, f64)>> =
        node_ids.iter().map(|id| (id, Vec::new())).collect();
    let mut leg: HashMap<(LocationId, LocationId), f64> = HashMap::new();

    for e in edges {
        // edges touching unknown or group nodes are ignored, not errors
        if !adjacency.contains_key(&e.from_id) || !adjacency.contains_key(&e.to_id) {
            continue;
        }
        if let Some(next) = adjacency.get_mut(&e.from_id) {
            next.push((&e.to_id, e.dv_m_s, e.tof_s));
        }
        leg.insert((e.from_id.clone(), e.to_id.clone()), e.tof_s);
    }

    let mut entries = Vec::new();
    for src in node_ids {
        let parents = dijkstra_all(src, |node: &LocationId| {
            adjacency
                .get(node)
                .into_iter()
                .flatten()
                .map(|(to, dv, _)| ((*to).clone(), OrderedFloat(*dv)))
                .collect::<Vec<_>>()
        });

        for dst in node_ids {
            if dst == src {
                entries.push(TransferMatrixEntry {
                    from_id: src.clone(),
                    to_id: dst.clone(),
                    dv_m_s: 0.0,
                    tof_s: 0.0,
                    path: vec![src.clone()],
                });
                continue;
            }
            let Some((_, cost)) = parents.get(dst) else {
                continue;
            };
            let path = build_path(dst, &parents);
            let tof_s: f64 = path
                .windows(2)
                .filter_map(|pair| leg.get(&(pair[0].clone(), pair[1].clone())))
                .sum();
            entries.push(TransferMatrixEntry {
                from_id: src.clone(),
                to_id: dst.clone(),
                dv_m_s: cost.into_inner(),
                tof_s,
                path,
            });
        }
    }

    entries
}

/// Lazily rebuild the persisted matrix when the edge hash drifts or the
/// cache is empty. Returns whether a rebuild happened.
pub async fn regenerate_matrix_if_needed(conn: &mut SqliteConnection) -> Result<bool> {
    let edges = LocationBmc::list_edges(&mut *conn).await?;
    let current_hash = hash_edges(&edges);
    let stored_hash = MatrixBmc::get_meta(&mut *conn, EDGES_HASH_META_KEY).await?;
    let row_count = MatrixBmc::count(&mut *conn).await?;

    if stored_hash.as_deref() == Some(current_hash.as_str()) && row_count > 0 {
        return Ok(false);
    }

    let nodes = LocationBmc::non_group_ids(&mut *conn).await?;
    let entries = compute_transfer_matrix(&nodes, &edges);
    info!(
        nodes = nodes.len(),
        entries = entries.len(),
        "rebuilding transfer matrix"
    );
    MatrixBmc::clear(&mut *conn).await?;
    MatrixBmc::insert_entries(&mut *conn, &entries).await?;
    MatrixBmc::set_meta(&mut *conn, EDGES_HASH_META_KEY, &current_hash).await?;
    Ok(true)
}

/// The router's consumer contract: least-Δv route between two non-group
/// locations, or `NoRoute`.
pub async fn route(
    conn: &mut SqliteConnection,
    from: &LocationId,
    to: &LocationId,
) -> GameResult<TransferMatrixEntry> {
    for id in [from, to] {
        let location = LocationBmc::get(&mut *conn, id)
            .await?
            .ok_or_else(|| GameError::not_found(format!("location '{id}'")))?;
        if location.is_group {
            return Err(GameError::validation(format!(
                "location '{id}' is a group and cannot be routed"
            )));
        }
    }

    regenerate_matrix_if_needed(&mut *conn).await?;

    MatrixBmc::get(&mut *conn, from, to)
        .await?
        .ok_or_else(|| GameError::NoRoute {
            from: from.clone(),
            to: to.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> LocationId {
        LocationId::new(raw)
    }

    fn edge(from: &str, to: &str, dv: f64, tof: f64) -> TransferEdge {
        TransferEdge {
            from_id: id(from),
            to_id: id(to),
            dv_m_s: dv,
            tof_s: tof,
        }
    }

    fn tiny_graph() -> (Vec<LocationId>, Vec<TransferEdge>) {
        (
            vec![id("GEO"), id("HEO"), id("LEO")],
            vec![
                edge("LEO", "HEO", 900.0, 7_200.0),
                edge("HEO", "GEO", 1_200.0, 14_400.0),
                edge("LEO", "GEO", 1_800.0, 21_600.0),
            ],
        )
    }

    fn entry<'a>(
        entries: &'a [TransferMatrixEntry],
        from: &str,
        to: &str,
    ) -> &'a TransferMatrixEntry {
        entries
            .iter()
            .find(|e| e.from_id.0 == from && e.to_id.0 == to)
            .unwrap()
    }

    #[test]
    fn direct_edge_beats_cheaper_looking_two_hop() {
        let (nodes, edges) = tiny_graph();
        let entries = compute_transfer_matrix(&nodes, &edges);

        let leo_geo = entry(&entries, "LEO", "GEO");
        assert_eq!(leo_geo.dv_m_s, 1_800.0);
        assert_eq!(leo_geo.tof_s, 21_600.0);
        assert_eq!(
            leo_geo.path,
            vec![id("LEO"), id("GEO")],
            "direct 1800 must beat 900+1200"
        );
    }

    #[test]
    fn self_entries_are_zero_cost() {
        let (nodes, edges) = tiny_graph();
        let entries = compute_transfer_matrix(&nodes, &edges);
        let self_entry = entry(&entries, "LEO", "LEO");
        assert_eq!(self_entry.dv_m_s, 0.0);
        assert_eq!(self_entry.tof_s, 0.0);
        assert_eq!(self_entry.path, vec![id("LEO")]);
    }

    #[test]
    fn unreachable_pairs_produce_no_entry() {
        let (nodes, edges) = tiny_graph();
        let entries = compute_transfer_matrix(&nodes, &edges);
        // edges are one-way in this fixture: GEO cannot reach LEO
        assert!(entries
            .iter()
            .all(|e| !(e.from_id.0 == "GEO" && e.to_id.0 == "LEO")));
    }

    #[test]
    fn path_dv_sums_to_entry_dv() {
        let (nodes, mut edges) = tiny_graph();
        // make the two-hop the winner
        edges[2].dv_m_s = 2_500.0;
        let entries = compute_transfer_matrix(&nodes, &edges);

        let leo_geo = entry(&entries, "LEO", "GEO");
        assert_eq!(leo_geo.path, vec![id("LEO"), id("HEO"), id("GEO")]);
        assert_eq!(leo_geo.dv_m_s, 2_100.0);
        assert_eq!(leo_geo.tof_s, 21_600.0);

        let summed: f64 = leo_geo
            .path
            .windows(2)
            .map(|pair| {
                edges
                    .iter()
                    .find(|e| e.from_id == pair[0] && e.to_id == pair[1])
                    .map(|e| e.dv_m_s)
                    .unwrap_or(f64::NAN)
            })
            .sum();
        assert_eq!(summed, leo_geo.dv_m_s);
    }

    #[test]
    fn edge_hash_is_order_stable_and_content_sensitive() {
        let (_, edges) = tiny_graph();
        let h1 = hash_edges(&edges);
        let h2 = hash_edges(&edges);
        assert_eq!(h1, h2);

        let mut changed = edges.clone();
        changed[0].dv_m_s += 1.0;
        assert_ne!(h1, hash_edges(&changed));
    }
}
