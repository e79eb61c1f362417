// One truncation policy for regions, nodes and edges.

use serde::Serialize;

pub const REGION_CEILING: usize = 8;
pub const NODE_CEILING: usize = 120;
pub const EDGE_CEILING: usize = 80;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CapReport {
    pub returned: usize,
    pub limit: usize,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Callers may tighten a ceiling but never loosen it.
pub fn effective_limit(ceiling: usize, requested: Option<usize>) -> usize {
    match requested {
        Some(requested) => requested.min(ceiling),
        None => ceiling,
    }
}

/// Cap `items` at `limit`.
///
/// `items` may carry one look-ahead row past the limit when the true size
/// is unknown; pass `total` when it is known so the report can carry it.
pub fn cap<T>(mut items: Vec<T>, limit: usize, total: Option<usize>, noun: &str) -> (Vec<T>, CapReport) {
    let available = total.unwrap_or(0).max(items.len());
    items.truncate(limit);
    let returned = items.len();
    let truncated = available > returned;
    let warning = if truncated {
        Some(match total {
            Some(total) => format!("showing {} of {} {}", returned, total, noun),
            None => format!("showing the first {} {}; more are available", returned, noun),
        })
    } else {
        None
    };
    let report = CapReport {
        returned,
        limit,
        truncated,
        total,
        warning,
    };
    (items, report)
}
