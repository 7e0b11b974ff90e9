//! Channel facade: one `SentChannel` per physical SENT line.

use crate::common::{pulse_flags, ChannelStats, FrameSignals, PulseOutcome, SentError, SlowMessage};
use crate::decoder::fast::{FastChannel, FastVerdict};
use crate::decoder::slow::SlowChannel;

/// Decoder state for one SENT line.
///
/// Feed every pulse interval (time between successive falling edges, in
/// capture clocks) to [`decode`](Self::decode), in order. The channel
/// calibrates itself from the sync pulses, assembles and CRC-checks fast
/// frames, and demultiplexes the slow channel out of the status bits of
/// accepted frames.
#[derive(Debug, Default)]
pub struct SentChannel {
    fast: FastChannel,
    slow: SlowChannel,
    stats: ChannelStats,
}

impl SentChannel {
    pub fn new() -> Self {
        Self {
            fast: FastChannel::new(),
            slow: SlowChannel::new(),
            stats: ChannelStats::new(),
        }
    }

    /// Feed one pulse.
    ///
    /// `ticks` is the interval to the previous falling edge in capture
    /// clocks; `flags` carries the [`pulse_flags`] bits. A
    /// [`Rejected`](PulseOutcome::Rejected) verdict resets the slow-channel
    /// stream and invalidates its mailboxes; decoding resumes automatically
    /// at the next sync.
    pub fn decode(&mut self, ticks: u32, flags: u8) -> PulseOutcome {
        if flags & pulse_flags::HW_OVERFLOW != 0 {
            // Non-fatal: a misframed pulse will fail the interval checks.
            self.stats.inc_hw_overflow();
        }

        match self.fast.decode(ticks, &mut self.stats) {
            FastVerdict::Frame(frame) => {
                let status = ((frame >> 28) & 0xF) as u8;
                self.slow.ingest(status, &mut self.stats);
                PulseOutcome::FrameComplete
            }
            FastVerdict::Pending => PulseOutcome::Assembling,
            FastVerdict::Restarted => {
                // The restart discarded the lock; the shift streams refer to
                // frames that no longer line up. Mailboxes keep their last
                // values until the next framing error.
                self.slow.clear_shifts();
                PulseOutcome::Assembling
            }
            FastVerdict::Rejected => {
                self.slow.reset();
                PulseOutcome::Rejected
            }
        }
    }

    /// Raw 32-bit word of the last CRC-validated frame.
    pub fn raw_frame(&self) -> Result<u32, SentError> {
        self.fast.last_frame().ok_or(SentError::NoData)
    }

    /// Decomposed status and signals of the last CRC-validated frame.
    pub fn signals(&self) -> Result<FrameSignals, SentError> {
        self.raw_frame().map(FrameSignals::from_raw)
    }

    /// Most recent slow-channel value for `id`.
    pub fn slow_channel_value(&self, id: u8) -> Result<u16, SentError> {
        self.slow.value(id)
    }

    /// Valid slow-channel mailbox entries, in slot order.
    pub fn slow_messages(&self) -> impl Iterator<Item = &SlowMessage> {
        self.slow.messages()
    }

    /// Current unit-tick estimate in capture clocks (diagnostic).
    pub fn tick_time(&self) -> f32 {
        self.fast.tick_per_unit() as f32
    }

    /// Running statistics counters.
    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }
}
