use serde::{Deserialize, Serialize};

use super::byte_reader::ByteReader;
use super::error::DecodeError;

/// What the readout unit did with a trigger on one control link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerAction {
    Sent,
    NotSentBusy,
    Filtered,
}

impl TryFrom<u8> for TriggerAction {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Sent),
            1 => Ok(Self::NotSentBusy),
            2 => Ok(Self::Filtered),
            other => Err(other),
        }
    }
}

/// The decoded contents of a `RU_{layer}_{stave}_trigger_actions.dat` file.
///
/// Layout (little-endian):
///
/// ```text
/// u64 number of triggers
/// u8  number of control links
/// for each trigger:
///     u8 action, repeated for each control link
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerActionTable {
    pub ctrl_link_count: usize,
    trigger_count: u64,
    // trigger-major, ctrl_link_count entries per trigger
    actions: Vec<TriggerAction>,
}

impl TriggerActionTable {
    pub fn decode(buffer: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(buffer);
        let n_triggers = reader.read_u64("trigger count")?;
        let ctrl_link_count = reader.read_u8("control link count")? as usize;
        reader.require_items(n_triggers, ctrl_link_count as u64, "trigger actions")?;

        // With no control links there are no actions to read, whatever the trigger count
        let actions_to_read = if ctrl_link_count == 0 { 0 } else { n_triggers };
        let mut actions = Vec::with_capacity(actions_to_read as usize * ctrl_link_count);
        for trigger_id in 0..actions_to_read {
            for link in 0..ctrl_link_count {
                let raw = reader.read_u8("trigger action")?;
                let action = TriggerAction::try_from(raw).map_err(|action| {
                    DecodeError::UnknownTriggerAction {
                        trigger_id,
                        link,
                        action,
                    }
                })?;
                actions.push(action);
            }
        }
        reader.finish()?;

        Ok(Self {
            ctrl_link_count,
            trigger_count: n_triggers,
            actions,
        })
    }

    /// Number of triggers declared by the file, also when it has no control links
    pub fn trigger_count(&self) -> u64 {
        self.trigger_count
    }

    pub fn action(&self, trigger_id: u64, link: usize) -> Option<TriggerAction> {
        if link >= self.ctrl_link_count {
            return None;
        }
        let index = usize::try_from(trigger_id)
            .ok()?
            .checked_mul(self.ctrl_link_count)?
            .checked_add(link)?;
        self.actions.get(index).copied()
    }

    /// `(trigger_id, action)` for every trigger on one control link, in trigger order
    pub fn link_actions(&self, link: usize) -> impl Iterator<Item = (u64, TriggerAction)> + '_ {
        let actions: &[TriggerAction] = if link < self.ctrl_link_count {
            &self.actions
        } else {
            &[]
        };
        actions
            .iter()
            .skip(link)
            .step_by(self.ctrl_link_count.max(1))
            .enumerate()
            .map(|(trigger_id, action)| (trigger_id as u64, *action))
    }

    pub fn count(&self, link: usize, action: TriggerAction) -> usize {
        self.link_actions(link).filter(|(_, a)| *a == action).count()
    }
}
