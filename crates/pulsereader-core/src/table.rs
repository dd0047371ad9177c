//! Fixed-capacity channel registry.
//!
//! An arena of [`MAX_CHANNELS`] slots keyed by caller-chosen line id. Slots are
//! reused after removal and there is at most one active slot per line. The
//! table never grows, so steady-state operation does not allocate.

use crate::channel::Channel;
use crate::config::MAX_CHANNELS;
use crate::error::{PulseError, PulseResult};
use crate::time::LineId;

/// Reference to an active channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle {
    line: LineId,
    slot: usize,
}

impl ChannelHandle {
    /// Line the channel is bound to.
    #[must_use]
    pub fn line(&self) -> LineId {
        self.line
    }

    /// Table slot holding the channel.
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// Result of [`ChannelTable::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Added {
    Created(ChannelHandle),
    Existing(ChannelHandle),
}

#[derive(Debug)]
pub(crate) struct ChannelTable {
    slots: [Channel; MAX_CHANNELS],
}

impl ChannelTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: [Channel::VACANT; MAX_CHANNELS],
        }
    }

    fn slot_of(&self, line: LineId) -> Option<usize> {
        self.slots
            .iter()
            .position(|channel| channel.active && channel.line == line)
    }

    pub(crate) fn lookup(&self, line: LineId) -> Option<ChannelHandle> {
        self.slot_of(line).map(|slot| ChannelHandle { line, slot })
    }

    pub(crate) fn get(&self, line: LineId) -> Option<&Channel> {
        self.slot_of(line).and_then(|slot| self.slots.get(slot))
    }

    pub(crate) fn get_mut(&mut self, line: LineId) -> Option<&mut Channel> {
        self.slot_of(line).and_then(|slot| self.slots.get_mut(slot))
    }

    /// Claim a slot for `line`. An already active line is returned untouched.
    ///
    /// `filter_window` must already be clamped.
    pub(crate) fn add(&mut self, line: LineId, filter_window: usize) -> PulseResult<Added> {
        if let Some(handle) = self.lookup(line) {
            return Ok(Added::Existing(handle));
        }

        let (slot, channel) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, channel)| !channel.active)
            .ok_or_else(|| PulseError::capacity_exceeded(MAX_CHANNELS))?;

        channel.reset_zero();
        channel.line = line;
        channel.filter_window = filter_window;
        channel.active = true;

        Ok(Added::Created(ChannelHandle { line, slot }))
    }

    pub(crate) fn remove(&mut self, line: LineId) -> PulseResult<ChannelHandle> {
        let handle = self.lookup(line).ok_or_else(|| PulseError::not_found(line))?;
        if let Some(channel) = self.slots.get_mut(handle.slot) {
            channel.active = false;
            channel.reset_zero();
        }
        Ok(handle)
    }

    /// Change the window of an active line and fully reset its transient state.
    pub(crate) fn reconfigure(
        &mut self,
        line: LineId,
        filter_window: usize,
    ) -> PulseResult<ChannelHandle> {
        let handle = self.lookup(line).ok_or_else(|| PulseError::not_found(line))?;
        if let Some(channel) = self.slots.get_mut(handle.slot) {
            channel.filter_window = filter_window;
            channel.reset_transient();
        }
        Ok(handle)
    }

    /// Reset every slot's transient state, keeping `active` and `filter_window`.
    pub(crate) fn reset_all_transient(&mut self) {
        for channel in &mut self.slots {
            channel.reset_transient();
        }
    }

    pub(crate) fn active(&self) -> impl Iterator<Item = &Channel> {
        self.slots.iter().filter(|channel| channel.active)
    }

    pub(crate) fn active_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.slots.iter_mut().filter(|channel| channel.active)
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active().count()
    }
}
