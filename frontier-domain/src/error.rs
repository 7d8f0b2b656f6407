use crate::ids::{ItemId, LocationId, ShipId, TechId};
use thiserror::Error;

/// Semantic failure kinds surfaced by the simulation kernel. Precondition
/// variants guarantee no partial effects: the ambient transaction is rolled
/// back by the caller.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient funds: need ${need:.0}, have ${have:.0}")]
    InsufficientFunds { need: f64, have: f64 },

    #[error("insufficient research points: need {need:.1}, have {have:.1}")]
    InsufficientPoints { need: f64, have: f64 },

    #[error("insufficient inventory at {location}: need {need}x {item}, have {have}")]
    InsufficientInventory {
        location: LocationId,
        item: ItemId,
        need: u32,
        have: u32,
    },

    #[error("insufficient fuel: need {need_kg:.1} kg, have {have_kg:.1} kg")]
    InsufficientFuel { need_kg: f64, have_kg: f64 },

    #[error("thruster Isp is zero; cannot achieve {dv_m_s:.1} m/s")]
    InsufficientIsp { dv_m_s: f64 },

    #[error("item '{0}' is not eligible for Earth-to-LEO boost")]
    NotBoostable(ItemId),

    #[error("tech '{0}' is already unlocked")]
    AlreadyUnlocked(TechId),

    #[error("prerequisites not met: {}", missing.iter().map(|t| t.0.as_str()).collect::<Vec<_>>().join(", "))]
    PrereqMissing { missing: Vec<TechId> },

    #[error("site '{0}' already prospected by this organization")]
    AlreadyProspected(LocationId),

    #[error("ship '{0}' is not docked")]
    NotDocked(ShipId),

    #[error("no transfer route from '{from}' to '{to}'")]
    NoRoute { from: LocationId, to: LocationId },

    #[error("inventory race while consuming '{0}'")]
    InventoryRace(ItemId),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GameError {
    pub fn validation(msg: impl Into<String>) -> GameError {
        GameError::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> GameError {
        GameError::NotFound(what.into())
    }
}

pub type GameResult<T> = Result<T, GameError>;
