use crate::ids::{LocationId, ShipId};
use crate::part::Part;
use serde::{Deserialize, Serialize};

/// Active transfer state. All four scalars are set together when a ship
/// departs and cleared together on arrival settlement.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Transit {
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    pub departed_at: f64,
    pub arrives_at: f64,
    pub path: Vec<LocationId>,
}

impl Transit {
    /// Fraction of the transfer completed at `now`, clamped to [0, 1].
    pub fn progress(&self, now_s: f64) -> f64 {
        let span = self.arrives_at - self.departed_at;
        if span <= 0.0 {
            return 1.0;
        }
        ((now_s - self.departed_at) / span).clamp(0.0, 1.0)
    }

    /// The hop being flown at `now`, as indices into `path`. Position along
    /// a transfer is a pure function of the stored endpoints; nothing is
    /// persisted mid-flight.
    pub fn current_leg(&self, now_s: f64) -> Option<(usize, usize)> {
        if self.path.len() < 2 {
            return None;
        }
        let legs = self.path.len() - 1;
        let scaled = self.progress(now_s) * legs as f64;
        let leg = (scaled.floor() as usize).min(legs - 1);
        Some((leg, leg + 1))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShipState<'a> {
    Docked(&'a LocationId),
    InTransit(&'a Transit),
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Ship {
    pub id: ShipId,
    pub name: String,
    pub shape: String,
    pub color: String,
    pub size_px: i64,
    pub notes: Vec<String>,
    /// Set iff docked; mutually exclusive with `transit`.
    pub location_id: Option<LocationId>,
    pub transit: Option<Transit>,
    pub parts: Vec<Part>,
    pub fuel_kg: f64,
    pub fuel_capacity_kg: f64,
    pub dry_mass_kg: f64,
    pub isp_s: f64,
}

impl Ship {
    pub fn state(&self) -> Option<ShipState<'_>> {
        match (&self.location_id, &self.transit) {
            (Some(loc), None) => Some(ShipState::Docked(loc)),
            (None, Some(transit)) => Some(ShipState::InTransit(transit)),
            _ => None,
        }
    }

    pub fn is_docked(&self) -> bool {
        matches!(self.state(), Some(ShipState::Docked(_)))
    }

    pub fn docked_at(&self) -> Option<&LocationId> {
        match self.state() {
            Some(ShipState::Docked(loc)) => Some(loc),
            _ => None,
        }
    }
}
