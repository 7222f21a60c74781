//! Depth limits on containment propagation.
//!
//! `None` stands for "unbounded" throughout.

use crate::config::DepthMode;

/// Per-path depth state carried through traversal.
pub type DepthState = Option<u32>;

/// Depth state of the originally changed entity.
pub const ORIGIN: DepthState = None;

fn tighter(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Decide whether an edge with `edge_max` may be followed from a node at
/// `hop` carrying `state`. Returns the state the target inherits, or `None`
/// when the edge must not propagate.
pub fn follow(mode: DepthMode, hop: u32, state: DepthState, edge_max: Option<u32>) -> Option<DepthState> {
    let limit = tighter(state, edge_max);
    match mode {
        DepthMode::HopsFromOrigin => match limit {
            Some(d) if hop >= d => None,
            _ => Some(limit),
        },
        DepthMode::RemainingBudget => match limit {
            Some(0) => None,
            Some(d) => Some(Some(d - 1)),
            None => Some(None),
        },
    }
}

/// Combine two ways of reaching a node that is queued but not yet expanded.
///
/// The result follows at least every edge either path could: the lower hop
/// and the looser limit.
pub fn looser(a: (u32, DepthState), b: (u32, DepthState)) -> (u32, DepthState) {
    let state = match (a.1, b.1) {
        (Some(x), Some(y)) => Some(x.max(y)),
        _ => None,
    };
    (a.0.min(b.0), state)
}
