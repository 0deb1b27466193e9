//! Heartbeats: extending the last event instead of appending a new one.

use chrono::TimeDelta;
use datastore::{Event, Result, StorageBackend};
use tracing::debug;

/// Merge `heartbeat` into `last` if they share data and the heartbeat starts
/// no later than `pulsetime` after `last` ends.
///
/// The merged event keeps `last`'s start and ends at the later of the two
/// ends. Heartbeats starting before `last` are never merged.
pub fn heartbeat_merge(last: &Event, heartbeat: &Event, pulsetime: TimeDelta) -> Option<Event> {
    if !last.same_context(heartbeat) {
        return None;
    }
    if heartbeat.timestamp < last.timestamp {
        return None;
    }
    let deadline = last.end().checked_add_signed(pulsetime);
    if deadline.is_some_and(|deadline| heartbeat.timestamp > deadline) {
        return None;
    }

    let end = last.end().max(heartbeat.end());
    let mut merged = last.clone();
    merged.duration = end - merged.timestamp;
    Some(merged)
}

/// Record a heartbeat in a bucket, merging it into the last event when
/// possible and appending it otherwise. Returns the event as stored.
pub fn heartbeat(
    backend: &mut dyn StorageBackend,
    bucket_id: &str,
    heartbeat: Event,
    pulsetime: TimeDelta,
) -> Result<Event> {
    let last = backend.get_events(bucket_id, Some(1))?.into_iter().next();
    match last.and_then(|last| heartbeat_merge(&last, &heartbeat, pulsetime)) {
        Some(merged) => {
            debug!(
                bucket = bucket_id,
                duration_ms = merged.duration.num_milliseconds(),
                "merged heartbeat"
            );
            backend.replace_last(bucket_id, merged.clone())?;
            Ok(merged)
        }
        None => {
            debug!(bucket = bucket_id, "heartbeat starts a new event");
            backend.insert_one(bucket_id, heartbeat.clone())?;
            Ok(heartbeat)
        }
    }
}
