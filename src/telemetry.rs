//! Compact per-tick delta shape for streaming collaborators.
//!
//! Top-line power figures round to whole kW for display; pool flows, grid
//! flows, and credits keep two to three decimals so small transfers survive
//! serialization. The field layout is the wire contract consumed by the
//! transport layer.

use serde::{Deserialize, Serialize};

use crate::sim::types::TickState;

/// Per-home slice of one tick delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeDelta {
    pub id: String,
    /// PV output, whole kW.
    pub pv: f64,
    /// Load, whole kW.
    pub load: f64,
    /// SOC as whole percent of capacity.
    pub soc: f64,
    /// Pool contribution (kW, 2 decimals).
    pub share: f64,
    /// Pool receipt (kW, 2 decimals).
    pub recv: f64,
    /// Grid import (kW, 2 decimals).
    pub imp: f64,
    /// Grid export (kW, 2 decimals).
    pub exp: f64,
    /// This tick's credit movement (kWh, 3 decimals).
    pub credits_delta: f64,
}

/// Community grid exchange, whole kW.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridDelta {
    pub imp: f64,
    pub exp: f64,
}

/// Community production and pool usage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommunityDelta {
    /// Total PV production, whole kW.
    pub prod: f64,
    /// Pool throughput (kW, 2 decimals).
    pub mg_used: f64,
    /// Destroyed demand (kW, 2 decimals).
    pub unserved: f64,
}

/// One tick's worth of streamed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickDelta {
    /// ISO-formatted simulated timestamp.
    pub ts: String,
    pub homes: Vec<HomeDelta>,
    pub grid: GridDelta,
    pub community: CommunityDelta,
}

impl TickDelta {
    /// Builds the rounded delta from a completed tick snapshot.
    pub fn from_state(state: &TickState) -> Self {
        Self {
            ts: state.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            homes: state
                .homes
                .iter()
                .map(|h| HomeDelta {
                    id: h.id.clone(),
                    pv: h.pv_kw.round(),
                    load: h.load_kw.round(),
                    soc: h.soc_pct().round(),
                    share: round2(h.share_kw),
                    recv: round2(h.recv_kw),
                    imp: round2(h.grid_in_kw),
                    exp: round2(h.grid_out_kw),
                    credits_delta: round3(h.credits_delta_kwh),
                })
                .collect(),
            grid: GridDelta {
                imp: state.community.grid_import_kw.round(),
                exp: state.community.grid_export_kw.round(),
            },
            community: CommunityDelta {
                prod: state.community.production_kw.round(),
                mg_used: round2(state.community.microgrid_used_kw),
                unserved: round2(state.community.unserved_kw),
            },
        }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}
