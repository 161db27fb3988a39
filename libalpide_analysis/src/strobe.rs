use serde::{Deserialize, Serialize};

use super::config::SimulationSettings;
use super::error::CorrelatorError;
use super::trigger_actions::{TriggerAction, TriggerActionTable};

/// Strobe windows are derived from the actions of this control link
pub const STROBE_CTRL_LINK: usize = 0;

/// The time span in which the pixel front ends of one physics event are above threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInterval {
    pub event_index: usize,
    pub active_start_ns: u64,
    pub active_end_ns: u64,
}

/// The time span in which a strobe latches hits into a frame, for one trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrobeWindow {
    pub trigger_id: u64,
    pub on_ns: u64,
    pub off_ns: u64,
    pub action: TriggerAction,
}

/// Absolute event times from the time between consecutive events. Event 0 happens at t = 0.
///
/// All timing arithmetic in this module saturates at `u64::MAX` ns.
pub fn event_times(deltas_ns: &[u64]) -> Vec<u64> {
    deltas_ns
        .iter()
        .scan(0u64, |time, delta| {
            let event_time = *time;
            *time = time.saturating_add(*delta);
            Some(event_time)
        })
        .collect()
}

pub fn event_intervals(deltas_ns: &[u64], settings: &SimulationSettings) -> Vec<EventInterval> {
    let start_offset = settings.pixel_shaping_dead_time_ns;
    let end_offset = start_offset.saturating_add(settings.pixel_shaping_active_time_ns);
    event_times(deltas_ns)
        .into_iter()
        .enumerate()
        .map(|(event_index, time)| EventInterval {
            event_index,
            active_start_ns: time.saturating_add(start_offset),
            active_end_ns: time.saturating_add(end_offset),
        })
        .collect()
}

/// One strobe window per trigger in the action table.
///
/// In continuous mode strobes follow a fixed period. In triggered mode trigger `n` is
/// issued by physics event `n`, so the strobe is placed relative to that event's time.
pub fn strobe_windows(
    actions: &TriggerActionTable,
    event_times_ns: &[u64],
    settings: &SimulationSettings,
) -> Result<Vec<StrobeWindow>, CorrelatorError> {
    let on_offset = settings
        .trigger_delay_ns
        .saturating_add(settings.strobe_inactive_length_ns);
    let off_offset = on_offset.saturating_add(settings.strobe_active_length_ns);

    actions
        .link_actions(STROBE_CTRL_LINK)
        .map(|(trigger_id, action)| {
            let base = if settings.continuous_mode {
                settings.continuous_period_ns.saturating_mul(trigger_id)
            } else {
                usize::try_from(trigger_id)
                    .ok()
                    .and_then(|index| event_times_ns.get(index))
                    .copied()
                    .ok_or(CorrelatorError::MissingEventForTrigger(trigger_id))?
            };
            Ok(StrobeWindow {
                trigger_id,
                on_ns: base.saturating_add(on_offset),
                off_ns: base.saturating_add(off_offset),
                action,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};

    fn settings() -> SimulationSettings {
        SimulationSettings {
            pixel_shaping_dead_time_ns: 200,
            pixel_shaping_active_time_ns: 6000,
            strobe_active_length_ns: 4900,
            strobe_inactive_length_ns: 100,
            trigger_delay_ns: 50,
            ..Default::default()
        }
    }

    fn action_table(actions: &[u8]) -> TriggerActionTable {
        let mut bytes = Vec::new();
        bytes.write_u64::<LittleEndian>(actions.len() as u64).unwrap();
        bytes.push(1);
        bytes.extend_from_slice(actions);
        TriggerActionTable::decode(&bytes).unwrap()
    }

    #[test]
    fn test_event_times() {
        assert_eq!(event_times(&[100, 250, 50]), vec![0, 100, 350]);
        assert!(event_times(&[]).is_empty());
    }

    #[test]
    fn test_event_intervals() {
        let intervals = event_intervals(&[1000, 1000], &settings());
        assert_eq!(
            intervals,
            vec![
                EventInterval {
                    event_index: 0,
                    active_start_ns: 200,
                    active_end_ns: 6200
                },
                EventInterval {
                    event_index: 1,
                    active_start_ns: 1200,
                    active_end_ns: 7200
                },
            ]
        );
    }

    #[test]
    fn test_times_saturate() {
        let intervals = event_intervals(&[u64::MAX, 1], &settings());
        assert_eq!(intervals[0].active_start_ns, 200);
        assert_eq!(intervals[1].active_start_ns, u64::MAX);
        assert_eq!(intervals[1].active_end_ns, u64::MAX);

        let mut settings = settings();
        settings.continuous_mode = true;
        settings.continuous_period_ns = u64::MAX / 2;
        let strobes = strobe_windows(&action_table(&[0, 0, 0]), &[], &settings).unwrap();
        assert_eq!(strobes[2].on_ns, u64::MAX);
        assert_eq!(strobes[2].off_ns, u64::MAX);
        assert!(strobes[1].on_ns < strobes[1].off_ns);
    }

    #[test]
    fn test_triggered_strobes() {
        let table = action_table(&[0, 2]);
        let strobes = strobe_windows(&table, &[0, 1000, 3000], &settings()).unwrap();
        assert_eq!(
            strobes,
            vec![
                StrobeWindow {
                    trigger_id: 0,
                    on_ns: 150,
                    off_ns: 5050,
                    action: TriggerAction::Sent
                },
                StrobeWindow {
                    trigger_id: 1,
                    on_ns: 1150,
                    off_ns: 6050,
                    action: TriggerAction::Filtered
                },
            ]
        );
    }

    #[test]
    fn test_continuous_strobes() {
        let mut settings = settings();
        settings.continuous_mode = true;
        settings.continuous_period_ns = 5000;
        let table = action_table(&[0, 1, 0]);
        let strobes = strobe_windows(&table, &[], &settings).unwrap();
        let on_times: Vec<u64> = strobes.iter().map(|s| s.on_ns).collect();
        assert_eq!(on_times, vec![150, 5150, 10150]);
        assert_eq!(strobes[1].action, TriggerAction::NotSentBusy);
    }

    #[test]
    fn test_missing_event_for_trigger() {
        let table = action_table(&[0, 0, 0]);
        assert_eq!(
            strobe_windows(&table, &[0, 10], &settings()),
            Err(CorrelatorError::MissingEventForTrigger(2))
        );
    }
}
