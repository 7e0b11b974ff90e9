//! Fast-channel state machine.
//!
//! Drives unit-tick calibration, sync acquisition and nibble capture from
//! raw pulse intervals, and gates completed frames through the CRC-4
//! variants. One pulse in, one verdict out; all timing is expressed in
//! capture clocks and judged against the calibrated unit tick.

use tracing::{debug, warn};

use crate::common::ChannelStats;
use crate::decoder::crc;

/// Protocol timing constants, in unit ticks and pulse counts.
pub(crate) mod constants {
    /// Units subtracted from every data pulse to yield a 0..15 nibble value.
    pub const OFFSET_UNITS: u32 = 12;
    /// Sync pulse length in units past the offset; the full sync is 56 units.
    pub const SYNC_UNITS: u32 = 56 - OFFSET_UNITS;
    /// Largest valid data nibble value.
    pub const NIBBLE_MAX: i64 = 15;
    /// Status + six data nibbles + CRC.
    pub const PAYLOAD_PULSES: u32 = 8;
    /// Sync + payload.
    pub const FRAME_PULSES: u32 = 9;
    /// One assumed sync plus three payloads' worth of pulses to find a lock.
    pub const CALIBRATION_PULSES: u32 = 1 + 3 * PAYLOAD_PULSES;
    /// Non-sync pulses tolerated during the sync hunt before recalibrating.
    pub const RESYNC_PULSES: u32 = 3 * FRAME_PULSES;
}

/// Position in the nibble frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FastState {
    /// Acquiring the unit tick without a known sync.
    Calib,
    /// Calibrated, hunting for a true sync pulse.
    Init,
    /// Awaiting the sync that opens the next frame.
    Sync,
    Status,
    Sig1Data1,
    Sig1Data2,
    Sig1Data3,
    Sig2Data1,
    Sig2Data2,
    Sig2Data3,
    Crc,
}

impl FastState {
    /// Next capture position after a data nibble. CRC completion is handled
    /// by the caller; non-capture states stay put.
    fn advance(self) -> FastState {
        match self {
            FastState::Status => FastState::Sig1Data1,
            FastState::Sig1Data1 => FastState::Sig1Data2,
            FastState::Sig1Data2 => FastState::Sig1Data3,
            FastState::Sig1Data3 => FastState::Sig2Data1,
            FastState::Sig2Data1 => FastState::Sig2Data2,
            FastState::Sig2Data2 => FastState::Sig2Data3,
            FastState::Sig2Data3 => FastState::Crc,
            other => other,
        }
    }
}

/// Per-pulse verdict of the fast channel, consumed by the channel facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FastVerdict {
    /// Frame completed and passed CRC.
    Frame(u32),
    /// Pulse consumed, frame still assembling.
    Pending,
    /// Framing or CRC error.
    Rejected,
    /// Calibration or resync budget exhausted; the decoder restarted itself.
    Restarted,
}

/// Fast-channel decoder state for one SENT line.
#[derive(Debug, Default)]
pub(crate) struct FastChannel {
    state: FastState,
    /// Unit tick in capture clocks, refreshed on every accepted sync.
    /// Zero means uncalibrated.
    tick_per_unit: u32,
    /// Pulses seen since calibration began.
    pulse_counter: u32,
    /// Pulses observed within the current state; meaning depends on the state.
    state_pulse_counter: u32,
    /// One-shot token: the current inter-frame gap already contained a
    /// tolerated non-sync pulse.
    pause_pulse_received: bool,
    /// Nibble shift register, most significant nibble first.
    rx_reg: u32,
    /// Last CRC-validated frame.
    rx_last: u32,
    has_valid: bool,
}

impl Default for FastState {
    fn default() -> Self {
        FastState::Calib
    }
}

impl FastChannel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed one pulse interval, in capture clocks.
    pub(crate) fn decode(&mut self, ticks: u32, stats: &mut ChannelStats) -> FastVerdict {
        self.pulse_counter = self.pulse_counter.wrapping_add(1);

        match self.state {
            FastState::Calib => return self.decode_calib(ticks, stats),
            FastState::Init => return self.decode_init(ticks, stats),
            _ => {}
        }

        let interval = self.nibble_interval(ticks);
        if interval < 0 {
            stats.inc_short_interval();
            self.drop_to_init();
            return FastVerdict::Rejected;
        }

        if self.state == FastState::Sync {
            return self.decode_sync(ticks, interval, stats);
        }

        // Calibration or SYNC may have ended on what was really a pause
        // pulse, leaving the true sync to arrive here.
        if self.state == FastState::Status && !self.pause_pulse_received && self.is_sync(ticks) {
            stats.inc_pause();
            self.calibrate_tick(ticks);
            return FastVerdict::Pending;
        }

        if interval > constants::NIBBLE_MAX {
            stats.inc_long_interval();
            self.drop_to_init();
            return FastVerdict::Rejected;
        }

        self.rx_reg = (self.rx_reg << 4) | interval as u32;

        if self.state != FastState::Crc {
            self.state = self.state.advance();
            return FastVerdict::Pending;
        }

        // Frame complete: the counter includes CRC failures, and the pause
        // token is spent regardless of the CRC outcome.
        stats.inc_frame();
        self.pause_pulse_received = false;
        self.state = FastState::Sync;

        let received = (self.rx_reg & 0xF) as u8;
        if received == crc::crc4(self.rx_reg)
            || received == crc::crc4_gm(self.rx_reg)
            || received == crc::crc4_gm_v2(self.rx_reg)
        {
            self.rx_last = self.rx_reg;
            self.has_valid = true;
            FastVerdict::Frame(self.rx_last)
        } else {
            stats.inc_crc_err();
            debug!(frame = %format_args!("{:#010x}", self.rx_reg), "frame rejected by CRC");
            FastVerdict::Rejected
        }
    }

    /// Acquire the unit tick without a known sync: assume the latest
    /// out-of-range pulse was a sync and test whether a full payload of
    /// plausible nibbles follows.
    fn decode_calib(&mut self, ticks: u32, stats: &mut ChannelStats) -> FastVerdict {
        if self.tick_per_unit == 0 || self.state_pulse_counter == 0 {
            self.calibrate_tick(ticks);
            self.state_pulse_counter = 1;
        } else {
            let interval = self.nibble_interval(ticks);
            if (0..=constants::NIBBLE_MAX).contains(&interval) {
                self.state_pulse_counter += 1;
                // A plausible hypothesis ends on the CRC pulse.
                if self.state_pulse_counter == 1 + constants::PAYLOAD_PULSES {
                    self.pulse_counter = 0;
                    self.state_pulse_counter = 0;
                    self.state = FastState::Init;
                }
            } else {
                self.state_pulse_counter = 1;
                self.calibrate_tick(ticks);
            }
        }

        if self.pulse_counter >= constants::CALIBRATION_PULSES {
            self.restart(stats);
            return FastVerdict::Restarted;
        }
        FastVerdict::Pending
    }

    /// Hunt for a true sync pulse after calibration or a framing error.
    fn decode_init(&mut self, ticks: u32, stats: &mut ChannelStats) -> FastVerdict {
        if self.is_sync(ticks) {
            self.calibrate_tick(ticks);
            // Calibration ends on a CRC pulse; exactly one stray pulse before
            // this sync means the device pads frames with a pause pulse.
            self.pause_pulse_received = self.state_pulse_counter == 1;
            self.state_pulse_counter = 0;
            self.state = FastState::Status;
            return FastVerdict::Pending;
        }

        self.state_pulse_counter += 1;
        if self.state_pulse_counter >= constants::RESYNC_PULSES {
            self.restart(stats);
            return FastVerdict::Restarted;
        }
        FastVerdict::Pending
    }

    /// Await the sync that opens the next frame, tolerating one pause pulse.
    fn decode_sync(&mut self, ticks: u32, interval: i64, stats: &mut ChannelStats) -> FastVerdict {
        if self.is_sync(ticks) {
            // The measured sync drives the tick estimate until the next one.
            self.calibrate_tick(ticks);
            self.rx_reg = 0;
            self.state = FastState::Status;
            return FastVerdict::Pending;
        }

        if self.pause_pulse_received {
            stats.inc_sync_err();
            if interval > i64::from(constants::SYNC_UNITS) {
                stats.inc_long_interval();
            } else {
                stats.inc_short_interval();
            }
            self.drop_to_init();
            return FastVerdict::Rejected;
        }

        stats.inc_pause();
        self.pause_pulse_received = true;
        FastVerdict::Pending
    }

    /// Recompute the unit tick from a sync-length pulse, rounding to nearest.
    fn calibrate_tick(&mut self, ticks: u32) {
        let sync_total = u64::from(constants::SYNC_UNITS + constants::OFFSET_UNITS);
        self.tick_per_unit = ((u64::from(ticks) + sync_total / 2) / sync_total) as u32;
    }

    /// Pulse length in units past the nibble offset, rounding to nearest.
    /// Negative means shorter than any legal data pulse.
    fn nibble_interval(&self, ticks: u32) -> i64 {
        let unit = u64::from(self.tick_per_unit);
        debug_assert!(unit != 0, "interval conversion before calibration");
        let units = (u64::from(ticks) + unit / 2) / unit;
        units as i64 - i64::from(constants::OFFSET_UNITS)
    }

    /// Whether a pulse falls within ±20% of the expected sync length.
    fn is_sync(&self, ticks: u32) -> bool {
        if self.tick_per_unit == 0 {
            return false;
        }
        let sync_clocks = u64::from(constants::SYNC_UNITS + constants::OFFSET_UNITS)
            * u64::from(self.tick_per_unit);
        let scaled = 100 * u64::from(ticks);
        scaled >= 80 * sync_clocks && scaled <= 120 * sync_clocks
    }

    /// Re-enter the sync hunt after a framing error. Calibration survives;
    /// transient noise must not cost the tick estimate.
    fn drop_to_init(&mut self) {
        self.state = FastState::Init;
        self.state_pulse_counter = 0;
    }

    /// Discard the lock and start calibration over.
    fn restart(&mut self, stats: &mut ChannelStats) {
        warn!(
            restarts = stats.restart_cnt.saturating_add(1),
            "frame lock lost, restarting calibration"
        );
        self.state = FastState::Calib;
        self.tick_per_unit = 0;
        self.pulse_counter = 0;
        self.state_pulse_counter = 0;
        self.pause_pulse_received = false;
        self.rx_reg = 0;
        stats.restart();
    }

    /// Last CRC-validated frame, if any frame has ever validated.
    pub(crate) fn last_frame(&self) -> Option<u32> {
        self.has_valid.then_some(self.rx_last)
    }

    /// Current unit-tick estimate in capture clocks; zero while uncalibrated.
    pub(crate) fn tick_per_unit(&self) -> u32 {
        self.tick_per_unit
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> FastState {
        self.state
    }
}
