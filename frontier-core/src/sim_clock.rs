use anyhow::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::time::{SystemTime, UNIX_EPOCH};

use frontier_store::MatrixBmc;

/// 2000-01-01T00:00:00Z. `reset` rewinds game time here.
pub const GAME_EPOCH_S: f64 = 946_684_800.0;

/// Real seconds → game seconds multiplier when running.
pub const DEFAULT_TIME_SCALE: f64 = 48.0;

pub const SIM_CLOCK_META_REAL_ANCHOR: &str = "sim_real_time_anchor_s";
pub const SIM_CLOCK_META_GAME_ANCHOR: &str = "sim_game_time_anchor_s";
pub const SIM_CLOCK_META_PAUSED: &str = "sim_paused";

/// Source of virtual time. Services take this instead of `SimClock` so
/// tests can drive time by hand.
pub trait GameClock: Send + Sync {
    fn now_s(&self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    pub real_time_anchor_s: f64,
    pub game_time_anchor_s: f64,
    pub paused: bool,
}

#[derive(Debug)]
struct ClockState {
    real_anchor_s: f64,
    game_anchor_s: f64,
    paused: bool,
}

/// Scaled virtual clock. The three anchor scalars are the only mutable
/// process state in the whole system; every accessor holds the mutex for
/// its full duration and performs no I/O.
#[derive(Debug)]
pub struct SimClock {
    scale: f64,
    state: Mutex<ClockState>,
}

impl SimClock {
    pub fn new(scale: f64) -> Self {
        let now = real_now_s();
        SimClock {
            scale,
            state: Mutex::new(ClockState {
                real_anchor_s: now,
                game_anchor_s: now,
                paused: false,
            }),
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Zero while paused, the configured scale otherwise.
    pub fn effective_scale(&self) -> f64 {
        if self.paused() {
            0.0
        } else {
            self.scale
        }
    }

    /// Rebase the anchors on the current instant and flip the pause flag.
    /// Rebasing first is what keeps game time continuous across the edge.
    pub fn set_paused(&self, paused: bool) {
        let real_now = real_now_s();
        let mut state = self.state.lock();
        let current_game_s = project(&state, real_now, self.scale);
        state.game_anchor_s = current_game_s;
        state.real_anchor_s = real_now;
        state.paused = paused;
    }

    pub fn reset(&self) {
        let real_now = real_now_s();
        let mut state = self.state.lock();
        state.real_anchor_s = real_now;
        state.game_anchor_s = GAME_EPOCH_S;
        state.paused = false;
    }

    pub fn export(&self) -> ClockSnapshot {
        let state = self.state.lock();
        ClockSnapshot {
            real_time_anchor_s: state.real_anchor_s,
            game_time_anchor_s: state.game_anchor_s,
            paused: state.paused,
        }
    }

    pub fn import(&self, snapshot: ClockSnapshot) {
        let mut state = self.state.lock();
        state.real_anchor_s = snapshot.real_time_anchor_s;
        state.game_anchor_s = snapshot.game_time_anchor_s;
        state.paused = snapshot.paused;
    }
}

impl GameClock for SimClock {
    fn now_s(&self) -> f64 {
        let real_now = real_now_s();
        let state = self.state.lock();
        project(&state, real_now, self.scale)
    }
}

fn project(state: &ClockState, real_now_s: f64, scale: f64) -> f64 {
    if state.paused {
        state.game_anchor_s
    } else {
        state.game_anchor_s + (real_now_s - state.real_anchor_s) * scale
    }
}

fn real_now_s() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Manually driven clock for tests.
#[derive(Debug)]
pub struct FakeClock {
    now: Mutex<f64>,
}

impl FakeClock {
    pub fn at(now_s: f64) -> Self {
        FakeClock {
            now: Mutex::new(now_s),
        }
    }

    pub fn advance(&self, delta_s: f64) {
        *self.now.lock() += delta_s;
    }

    pub fn set(&self, now_s: f64) {
        *self.now.lock() = now_s;
    }
}

impl GameClock for FakeClock {
    fn now_s(&self) -> f64 {
        *self.now.lock()
    }
}

/// Write the clock triple into the meta table.
pub async fn persist_clock_state(conn: &mut SqliteConnection, clock: &SimClock) -> Result<()> {
    let snapshot = clock.export();
    MatrixBmc::set_meta(
        &mut *conn,
        SIM_CLOCK_META_REAL_ANCHOR,
        &snapshot.real_time_anchor_s.to_string(),
    )
    .await?;
    MatrixBmc::set_meta(
        &mut *conn,
        SIM_CLOCK_META_GAME_ANCHOR,
        &snapshot.game_time_anchor_s.to_string(),
    )
    .await?;
    MatrixBmc::set_meta(
        &mut *conn,
        SIM_CLOCK_META_PAUSED,
        if snapshot.paused { "1" } else { "0" },
    )
    .await?;
    Ok(())
}

/// Restore the clock from the meta table. Missing or malformed rows mean
/// the stored state is unusable, so the current process state is persisted
/// instead of imported.
pub async fn load_clock_state(conn: &mut SqliteConnection, clock: &SimClock) -> Result<()> {
    let real_raw = MatrixBmc::get_meta(&mut *conn, SIM_CLOCK_META_REAL_ANCHOR).await?;
    let game_raw = MatrixBmc::get_meta(&mut *conn, SIM_CLOCK_META_GAME_ANCHOR).await?;
    let paused_raw = MatrixBmc::get_meta(&mut *conn, SIM_CLOCK_META_PAUSED).await?;

    let parsed = match (real_raw, game_raw, paused_raw) {
        (Some(real), Some(game), Some(paused)) => {
            match (real.parse::<f64>(), game.parse::<f64>()) {
                (Ok(real_time_anchor_s), Ok(game_time_anchor_s)) => Some(ClockSnapshot {
                    real_time_anchor_s,
                    game_time_anchor_s,
                    paused: matches!(
                        paused.trim().to_lowercase().as_str(),
                        "1" | "true" | "yes" | "on"
                    ),
                }),
                _ => None,
            }
        }
        _ => None,
    };

    match parsed {
        Some(snapshot) => {
            clock.import(snapshot);
            Ok(())
        }
        None => persist_clock_state(conn, clock).await,
    }
}
