//! Assignment of physics events to the strobes that captured them.
//!
//! Both inputs are time ordered, so the assignment is a single merge-like sweep: one cursor
//! walks the events while the strobes are visited in order. The cursor only ever moves
//! forward, so an event that was scanned for one strobe is never offered to a later strobe.
use serde::{Deserialize, Serialize};

use super::error::CorrelatorError;
use super::strobe::{EventInterval, StrobeWindow};
use super::trigger_actions::TriggerAction;

/// The events captured by one strobe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrobeEventMatch {
    pub trigger_id: u64,
    pub action: TriggerAction,
    pub pileup_count: usize,
    pub matched_event_indices: Vec<usize>,
}

/// Whether `correlate` checks the ordering of its inputs before sweeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderingCheck {
    /// Reject unordered or malformed input with a `CorrelatorError`
    #[default]
    Validate,
    /// Assume the input is ordered. Unordered input yields incomplete matches
    Trust,
}

struct EventCursor<'a> {
    events: &'a [EventInterval],
    position: usize,
}

impl<'a> EventCursor<'a> {
    fn new(events: &'a [EventInterval]) -> Self {
        Self {
            events,
            position: 0,
        }
    }

    fn match_strobe(&mut self, strobe: &StrobeWindow) -> StrobeEventMatch {
        let mut matched_event_indices = Vec::new();
        while let Some(event) = self.events.get(self.position) {
            if event.active_start_ns > strobe.off_ns {
                break;
            }
            if strobe.on_ns.max(event.active_start_ns) <= strobe.off_ns.min(event.active_end_ns) {
                matched_event_indices.push(event.event_index);
            }
            self.position += 1;
        }
        StrobeEventMatch {
            trigger_id: strobe.trigger_id,
            action: strobe.action,
            pileup_count: matched_event_indices.len(),
            matched_event_indices,
        }
    }
}

pub fn validate_events(events: &[EventInterval]) -> Result<(), CorrelatorError> {
    let mut previous: Option<u64> = None;
    for (index, event) in events.iter().enumerate() {
        if event.active_end_ns < event.active_start_ns {
            return Err(CorrelatorError::BadEventInterval {
                event_index: event.event_index,
                start: event.active_start_ns,
                end: event.active_end_ns,
            });
        }
        if let Some(previous) = previous {
            if event.active_start_ns < previous {
                return Err(CorrelatorError::EventsOutOfOrder {
                    index,
                    start: event.active_start_ns,
                    previous,
                });
            }
        }
        previous = Some(event.active_start_ns);
    }
    Ok(())
}

pub fn validate_strobes(strobes: &[StrobeWindow]) -> Result<(), CorrelatorError> {
    let mut previous: Option<u64> = None;
    for (index, strobe) in strobes.iter().enumerate() {
        if strobe.off_ns < strobe.on_ns {
            return Err(CorrelatorError::BadStrobeWindow {
                trigger_id: strobe.trigger_id,
                on: strobe.on_ns,
                off: strobe.off_ns,
            });
        }
        if let Some(previous) = previous {
            if strobe.on_ns < previous {
                return Err(CorrelatorError::StrobesOutOfOrder {
                    index,
                    on: strobe.on_ns,
                    previous,
                });
            }
        }
        previous = Some(strobe.on_ns);
    }
    Ok(())
}

/// Match every strobe with the events whose active window overlaps it.
///
/// Events must be ascending by `active_start_ns` and strobes ascending by `on_ns`. Returns one
/// `StrobeEventMatch` per strobe, in strobe order. Runs in O(events + strobes).
pub fn correlate(
    events: &[EventInterval],
    strobes: &[StrobeWindow],
    check: OrderingCheck,
) -> Result<Vec<StrobeEventMatch>, CorrelatorError> {
    if check == OrderingCheck::Validate {
        validate_events(events)?;
        validate_strobes(strobes)?;
    }

    let mut cursor = EventCursor::new(events);
    Ok(strobes
        .iter()
        .map(|strobe| cursor.match_strobe(strobe))
        .collect())
}

/// Number of strobes with each pileup count, index = pileup
pub fn pileup_histogram(matches: &[StrobeEventMatch]) -> Vec<usize> {
    let mut histogram = Vec::new();
    for m in matches {
        if histogram.len() <= m.pileup_count {
            histogram.resize(m.pileup_count + 1, 0);
        }
        histogram[m.pileup_count] += 1;
    }
    histogram
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_index: usize, start: u64, end: u64) -> EventInterval {
        EventInterval {
            event_index,
            active_start_ns: start,
            active_end_ns: end,
        }
    }

    fn strobe(trigger_id: u64, on: u64, off: u64) -> StrobeWindow {
        StrobeWindow {
            trigger_id,
            on_ns: on,
            off_ns: off,
            action: TriggerAction::Sent,
        }
    }

    #[test]
    fn test_two_events_one_strobe() {
        let events = [event(0, 0, 10), event(1, 20, 30)];
        let strobes = [strobe(0, 5, 25), strobe(1, 100, 110)];
        let matches = correlate(&events, &strobes, OrderingCheck::Validate).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].pileup_count, 2);
        assert_eq!(matches[0].matched_event_indices, vec![0, 1]);
        assert_eq!(matches[1].pileup_count, 0);
        assert!(matches[1].matched_event_indices.is_empty());
        assert_eq!(pileup_histogram(&matches), vec![1, 0, 1]);
    }

    #[test]
    fn test_touching_windows_overlap() {
        let events = [event(0, 0, 10), event(1, 12, 14)];
        let strobes = [strobe(0, 10, 11)];
        let matches = correlate(&events, &strobes, OrderingCheck::Validate).unwrap();
        assert_eq!(matches[0].matched_event_indices, vec![0]);
    }

    #[test]
    fn test_scanned_events_are_not_offered_again() {
        // Event 1 overlaps both strobes but was already scanned for the first
        let events = [event(0, 0, 5), event(1, 8, 40), event(2, 35, 45)];
        let strobes = [strobe(0, 0, 10), strobe(1, 30, 50)];
        let matches = correlate(&events, &strobes, OrderingCheck::Validate).unwrap();
        assert_eq!(matches[0].matched_event_indices, vec![0, 1]);
        assert_eq!(matches[1].matched_event_indices, vec![2]);
    }

    #[test]
    fn test_events_before_strobe_are_skipped() {
        let events = [event(0, 0, 5), event(1, 50, 60)];
        let strobes = [strobe(0, 40, 70)];
        let matches = correlate(&events, &strobes, OrderingCheck::Validate).unwrap();
        assert_eq!(matches[0].matched_event_indices, vec![1]);
    }

    #[test]
    fn test_no_input() {
        assert!(correlate(&[], &[], OrderingCheck::Validate).unwrap().is_empty());
        let matches = correlate(&[], &[strobe(0, 0, 1)], OrderingCheck::Validate).unwrap();
        assert_eq!(matches[0].pileup_count, 0);
    }

    #[test]
    fn test_ordering_violations() {
        let events = [event(0, 50, 60), event(1, 0, 10)];
        let strobes = [strobe(0, 0, 20)];
        assert_eq!(
            correlate(&events, &strobes, OrderingCheck::Validate),
            Err(CorrelatorError::EventsOutOfOrder {
                index: 1,
                start: 0,
                previous: 50
            })
        );

        let strobes = [strobe(0, 30, 40), strobe(1, 10, 20)];
        assert!(matches!(
            correlate(&[], &strobes, OrderingCheck::Validate),
            Err(CorrelatorError::StrobesOutOfOrder { index: 1, .. })
        ));

        assert!(matches!(
            correlate(&[event(3, 10, 5)], &[], OrderingCheck::Validate),
            Err(CorrelatorError::BadEventInterval { event_index: 3, .. })
        ));
        assert!(matches!(
            correlate(&[], &[strobe(7, 10, 5)], OrderingCheck::Validate),
            Err(CorrelatorError::BadStrobeWindow { trigger_id: 7, .. })
        ));
    }

    #[test]
    fn test_trusted_unordered_input_is_incomplete() {
        let events = [event(0, 50, 60), event(1, 0, 10)];
        let strobes = [strobe(0, 0, 20), strobe(1, 45, 70)];
        let matches = correlate(&events, &strobes, OrderingCheck::Trust).unwrap();
        assert_eq!(matches.len(), 2);
        // Event 1 is hidden behind event 0 for the first strobe
        assert!(matches[0].matched_event_indices.is_empty());
        assert_eq!(matches[1].matched_event_indices, vec![0]);
    }
}
