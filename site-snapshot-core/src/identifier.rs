use chrono::{DateTime, Utc};

/// Default snapshot identifier: Unix seconds as a decimal string.
///
/// Unique only at second granularity. Callers running more than one snapshot
/// per second must pass their own identifier.
pub fn default_snapshot_id() -> String {
    snapshot_id_at(Utc::now())
}

pub fn snapshot_id_at(now: DateTime<Utc>) -> String {
    now.timestamp().to_string()
}

/// Picks the caller's identifier, falling back to the timestamp when it is
/// missing or blank.
pub fn resolve_snapshot_id(supplied: Option<&str>) -> String {
    match supplied.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => default_snapshot_id(),
    }
}
