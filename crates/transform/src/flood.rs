//! Flooding: closing small gaps between adjacent events.
//!
//! Watchers sample activity with gaps between samples (polling delays,
//! missed heartbeats). Flooding walks a time-sorted sequence once and, for
//! every pair of neighbours no more than `pulsetime` apart, lets the longer
//! event absorb its neighbour when both carry the same data, or snaps the
//! two together when they don't.

use chrono::TimeDelta;
use datastore::Event;
use tracing::warn;

/// Gap below which neighbouring events are flooded together.
pub const DEFAULT_PULSETIME: TimeDelta = TimeDelta::seconds(5);

/// Flood `events` with the given `pulsetime`.
///
/// The input is left untouched; the result is sorted by timestamp and holds
/// no zero-length events. The pass is a single sweep over adjacent pairs, so
/// a run of three or more mergeable events can need a second call to fully
/// collapse.
pub fn flood(events: &[Event], pulsetime: TimeDelta) -> Vec<Event> {
    let mut events = events.to_vec();
    events.sort_by_key(|e| e.timestamp);

    let mut warned_negative_gap = false;
    for i in 1..events.len() {
        let (head, tail) = events.split_at_mut(i);
        let (e1, e2) = (&mut head[i - 1], &mut tail[0]);

        let gap = e2.timestamp - e1.end();
        if gap < TimeDelta::zero() && !warned_negative_gap {
            warn!(
                gap_secs = gap.num_milliseconds() as f64 / 1000.0,
                "gap was of negative duration; this warning is only shown once per batch"
            );
            warned_negative_gap = true;
        }

        if gap <= pulsetime {
            flood_pair(e1, e2);
        }
    }

    // Collapsed events have zero length; overlapping input can leave negative ones.
    events.retain(|e| e.duration > TimeDelta::zero());
    events
}

/// Merge or snap two neighbours, favouring the longer one (`e1` on ties).
fn flood_pair(e1: &mut Event, e2: &mut Event) {
    let e2_end = e2.end();
    let same_data = e1.same_context(e2);

    if e1.duration >= e2.duration {
        if same_data {
            // e1 swallows e2
            e1.duration = e2_end - e1.timestamp;
            e2.timestamp = e2_end;
            e2.duration = TimeDelta::zero();
        } else {
            e1.duration = e2.timestamp - e1.timestamp;
        }
    } else if same_data {
        // e2 swallows e1
        e2.timestamp = e1.timestamp;
        e2.duration = e2_end - e2.timestamp;
        e1.duration = TimeDelta::zero();
    } else {
        e2.timestamp = e1.end();
        e2.duration = e2_end - e2.timestamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use datastore::EventData;
    use serde_json::json;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn ev(secs: i64, duration: i64, app: &str) -> Event {
        let mut data = EventData::new();
        data.insert("app".into(), json!(app));
        Event::new(at(secs), TimeDelta::seconds(duration), data)
    }

    #[test]
    fn merges_same_data_into_longer_first_event() {
        let events = vec![ev(0, 10, "x"), ev(12, 3, "x")];
        assert_eq!(flood(&events, DEFAULT_PULSETIME), vec![ev(0, 15, "x")]);
    }

    #[test]
    fn leaves_events_beyond_pulsetime_alone() {
        let events = vec![ev(0, 10, "x"), ev(20, 3, "y")];
        assert_eq!(flood(&events, DEFAULT_PULSETIME), events);
    }

    #[test]
    fn merges_same_data_into_longer_second_event() {
        let events = vec![ev(0, 2, "x"), ev(3, 10, "x")];
        assert_eq!(flood(&events, DEFAULT_PULSETIME), vec![ev(0, 13, "x")]);
    }

    #[test]
    fn longer_first_event_with_other_data_extends_to_next_start() {
        let events = vec![ev(0, 10, "x"), ev(12, 3, "y")];
        assert_eq!(
            flood(&events, DEFAULT_PULSETIME),
            vec![ev(0, 12, "x"), ev(12, 3, "y")]
        );
    }

    #[test]
    fn longer_second_event_with_other_data_extends_back_to_previous_end() {
        let events = vec![ev(0, 2, "x"), ev(3, 10, "y")];
        assert_eq!(
            flood(&events, DEFAULT_PULSETIME),
            vec![ev(0, 2, "x"), ev(2, 11, "y")]
        );
    }

    #[test]
    fn equal_durations_favour_the_earlier_event() {
        // Different data: the earlier event grows, the later one is untouched.
        let events = vec![ev(0, 5, "x"), ev(7, 5, "y")];
        assert_eq!(
            flood(&events, DEFAULT_PULSETIME),
            vec![ev(0, 7, "x"), ev(7, 5, "y")]
        );

        // Same data: the earlier event absorbs the later one.
        let events = vec![ev(0, 5, "x"), ev(7, 5, "x")];
        assert_eq!(flood(&events, DEFAULT_PULSETIME), vec![ev(0, 12, "x")]);
    }

    #[test]
    fn gap_exactly_pulsetime_is_flooded() {
        let events = vec![ev(0, 10, "x"), ev(15, 1, "x")];
        assert_eq!(flood(&events, DEFAULT_PULSETIME), vec![ev(0, 16, "x")]);

        let events = vec![ev(0, 10, "x"), ev(16, 1, "x")];
        assert_eq!(flood(&events, DEFAULT_PULSETIME), events);
    }

    #[test]
    fn zero_pulsetime_only_joins_touching_events() {
        let events = vec![ev(0, 10, "x"), ev(10, 5, "x"), ev(20, 5, "x")];
        assert_eq!(
            flood(&events, TimeDelta::zero()),
            vec![ev(0, 15, "x"), ev(20, 5, "x")]
        );
    }

    #[test]
    fn overlapping_events_are_snapped() {
        let events = vec![ev(0, 10, "x"), ev(5, 3, "y")];
        assert_eq!(
            flood(&events, DEFAULT_PULSETIME),
            vec![ev(0, 5, "x"), ev(5, 3, "y")]
        );
    }

    #[test]
    fn negative_gap_warning_is_logged_once_per_batch() {
        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<u8>>>);

        impl Captured {
            fn count(&self, needle: &str) -> usize {
                let log = self.0.lock().unwrap();
                String::from_utf8_lossy(&log).matches(needle).count()
            }
        }

        impl io::Write for Captured {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();

        // Two overlapping pairs in one batch.
        let events = vec![ev(0, 10, "x"), ev(5, 3, "y"), ev(20, 10, "z"), ev(25, 3, "w")];
        tracing::subscriber::with_default(subscriber, || {
            flood(&events, DEFAULT_PULSETIME);
            assert_eq!(captured.count("negative duration"), 1);

            flood(&events, DEFAULT_PULSETIME);
            assert_eq!(captured.count("negative duration"), 2);
        });
    }

    #[test]
    fn huge_durations_do_not_overflow() {
        let long: Event = serde_json::from_value(json!({
            "timestamp": "2024-01-01T00:00:00Z",
            "duration": 9_000_000_000_000u64,
            "data": {"app": "x"}
        }))
        .unwrap();
        let next: Event = serde_json::from_value(json!({
            "timestamp": "2024-01-01T00:00:20Z",
            "duration": 1,
            "data": {"app": "x"}
        }))
        .unwrap();

        let flooded = flood(&[long.clone(), next.clone()], DEFAULT_PULSETIME);
        assert_eq!(flooded.len(), 1);
        assert_eq!(flooded[0].timestamp, long.timestamp);
        assert_eq!(flooded[0].end(), next.end());

        let mut other = next;
        other.data.insert("app".into(), json!("y"));
        let flooded = flood(&[long.clone(), other.clone()], DEFAULT_PULSETIME);
        assert_eq!(flooded.len(), 2);
        assert_eq!(flooded[0].end(), other.timestamp);
    }

    #[test]
    fn sorts_unordered_input_without_touching_it() {
        let events = vec![ev(20, 3, "y"), ev(0, 10, "x")];
        let before = events.clone();
        let flooded = flood(&events, DEFAULT_PULSETIME);
        assert_eq!(events, before);
        assert_eq!(flooded, vec![ev(0, 10, "x"), ev(20, 3, "y")]);
    }

    #[test]
    fn empty_and_single_inputs() {
        assert!(flood(&[], DEFAULT_PULSETIME).is_empty());
        assert_eq!(flood(&[ev(0, 1, "x")], DEFAULT_PULSETIME), vec![ev(0, 1, "x")]);
        assert!(flood(&[ev(0, 0, "x")], DEFAULT_PULSETIME).is_empty());
    }

    #[test]
    fn chains_need_a_second_pass() {
        let events = vec![ev(0, 10, "x"), ev(12, 3, "x"), ev(17, 3, "x")];
        let once = flood(&events, DEFAULT_PULSETIME);
        assert_eq!(once, vec![ev(0, 15, "x"), ev(15, 5, "x")]);
        assert_eq!(flood(&once, DEFAULT_PULSETIME), vec![ev(0, 20, "x")]);
    }

    #[test]
    fn flooding_twice_changes_nothing_more() {
        let cases = [
            vec![ev(0, 10, "x"), ev(12, 3, "x")],
            vec![ev(0, 10, "x"), ev(20, 3, "y")],
            vec![ev(0, 2, "x"), ev(3, 10, "x")],
            vec![ev(0, 5, "x"), ev(7, 5, "y"), ev(30, 4, "x"), ev(36, 1, "z")],
        ];
        for events in cases {
            let once = flood(&events, DEFAULT_PULSETIME);
            assert_eq!(flood(&once, DEFAULT_PULSETIME), once, "input {events:?}");
        }
    }

    #[test]
    fn never_grows_and_never_emits_empty_events() {
        // Deterministic pseudo-random timelines with overlaps and gaps.
        let apps = ["a", "b", "c"];
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |bound: u64| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed % bound
        };

        for _ in 0..200 {
            let len = next(12) as usize;
            let events: Vec<_> = (0..len)
                .map(|_| {
                    ev(
                        next(120) as i64,
                        next(15) as i64,
                        apps[next(apps.len() as u64) as usize],
                    )
                })
                .collect();

            let flooded = flood(&events, DEFAULT_PULSETIME);
            assert!(flooded.len() <= events.len());
            assert!(flooded.iter().all(|e| e.duration > TimeDelta::zero()));
        }
    }
}
