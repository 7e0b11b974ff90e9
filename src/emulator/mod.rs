//! Synthetic SENT pulse trains for tests and demo captures.
//!
//! Plays the role a sensor plus a timer-capture peripheral would: it turns
//! frame payloads into the pulse interval sequence the decoder consumes,
//! optionally with Gaussian edge jitter and inter-frame pause pulses, and
//! plans the status-bit series that spell out slow-channel messages.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::decoder::crc;

/// One frame's slow-channel contribution: the (bit 2, bit 3) pair of the
/// status nibble.
pub type BitPair = (bool, bool);

/// Which CRC-4 flavor to stamp on generated frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcVariant {
    /// SAE J2716 reference.
    Sae,
    /// GM throttle-body variant.
    Gm,
    /// GM GDI fuel-pressure variant.
    GmV2,
}

/// Emulator configuration
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Unit tick length in capture clocks.
    pub tick_per_unit: u32,
    /// CRC variant stamped on generated frames.
    pub crc_variant: CrcVariant,
    /// Standard deviation of Gaussian pulse jitter, in clocks (0 = exact).
    pub jitter_clocks: f64,
    /// RNG seed, so generated captures are reproducible.
    pub seed: u64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            tick_per_unit: 3,
            crc_variant: CrcVariant::Sae,
            jitter_clocks: 0.0,
            seed: 42,
        }
    }
}

/// Pulse-train generator for one emulated SENT line.
#[derive(Debug)]
pub struct SentEmulator {
    config: EmulatorConfig,
    rng: StdRng,
    jitter: Option<Normal<f64>>,
}

impl SentEmulator {
    pub fn new(config: EmulatorConfig) -> Self {
        let jitter = if config.jitter_clocks > 0.0 {
            Normal::new(0.0, config.jitter_clocks).ok()
        } else {
            None
        };
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            jitter,
        }
    }

    /// A 56-unit sync pulse.
    pub fn sync_pulse(&mut self) -> u32 {
        self.jittered(56 * self.config.tick_per_unit)
    }

    /// A data pulse encoding one nibble value.
    pub fn nibble_pulse(&mut self, value: u8) -> u32 {
        self.jittered((12 + u32::from(value & 0xF)) * self.config.tick_per_unit)
    }

    /// A minimum-length inter-frame pause pulse (12 units, like a zero
    /// nibble).
    pub fn pause_pulse(&mut self) -> u32 {
        self.jittered(12 * self.config.tick_per_unit)
    }

    /// The nine pulses of one frame: sync, status, six signal nibbles in
    /// wire order, CRC.
    pub fn frame(&mut self, status: u8, sig0: u16, sig1: u16) -> Vec<u32> {
        let word = frame_word(status, sig0, sig1, self.config.crc_variant);
        let mut pulses = Vec::with_capacity(9);
        pulses.push(self.sync_pulse());
        for n in 0..8 {
            pulses.push(self.nibble_pulse(crc::frame_nibble(word, n)));
        }
        pulses
    }

    /// Frames carrying a slow-channel bit plan, one frame per bit pair,
    /// with zeroed signals.
    pub fn slow_series(&mut self, plan: &[BitPair]) -> Vec<u32> {
        let mut pulses = Vec::with_capacity(plan.len() * 9);
        for &pair in plan {
            pulses.extend(self.frame(status_for(pair), 0, 0));
        }
        pulses
    }

    fn jittered(&mut self, clocks: u32) -> u32 {
        match self.jitter {
            Some(dist) => {
                let offset = dist.sample(&mut self.rng);
                (f64::from(clocks) + offset).round().max(1.0) as u32
            }
            None => clocks,
        }
    }
}

/// Pack a frame payload and stamp the requested CRC variant.
pub fn frame_word(status: u8, sig0: u16, sig1: u16, variant: CrcVariant) -> u32 {
    let word = (u32::from(status & 0xF) << 28)
        | (u32::from(sig0 & 0xFFF) << 16)
        | (u32::from(sig1 & 0xFFF) << 4);
    let crc = match variant {
        CrcVariant::Sae => crc::crc4(word),
        CrcVariant::Gm => crc::crc4_gm(word),
        CrcVariant::GmV2 => crc::crc4_gm_v2(word),
    };
    word | u32::from(crc)
}

/// Status nibble carrying one slow-channel bit pair; bits 0 and 1 are left
/// clear.
pub fn status_for(pair: BitPair) -> u8 {
    (u8::from(pair.0) << 2) | (u8::from(pair.1) << 3)
}

/// Short serial message plan: 16 frames. The b3 stream carries the start
/// bit, the b2 stream the 4-bit id, 8-bit payload and an unchecked trailing
/// nibble.
pub fn ssm_plan(id: u8, data: u8) -> [BitPair; 16] {
    let mut plan = [(false, false); 16];
    plan[0].1 = true;
    for i in 0..4 {
        plan[i].0 = id >> (3 - i) & 1 != 0;
    }
    for i in 0..8 {
        plan[4 + i].0 = data >> (7 - i) & 1 != 0;
    }
    plan
}

/// Enhanced serial message, 12-bit data with an 8-bit id: 18 frames.
pub fn esm12_plan(id: u8, data: u16) -> [BitPair; 18] {
    let mut plan = [(false, false); 18];
    for pair in &mut plan[..6] {
        pair.1 = true;
    }
    // plan[6] and plan[7] stay low: framing zero, then the C-flag clear.
    for i in 0..4 {
        plan[8 + i].1 = id >> (7 - i) & 1 != 0;
    }
    for i in 0..4 {
        plan[13 + i].1 = id >> (3 - i) & 1 != 0;
    }
    for i in 0..12 {
        plan[6 + i].0 = data >> (11 - i) & 1 != 0;
    }
    esm_finish(plan)
}

/// Enhanced serial message, 16-bit data with a 4-bit id: 18 frames.
pub fn esm16_plan(id: u8, data: u16) -> [BitPair; 18] {
    let mut plan = [(false, false); 18];
    for pair in &mut plan[..6] {
        pair.1 = true;
    }
    plan[7].1 = true; // C-flag: 16-bit layout
    for i in 0..4 {
        plan[8 + i].1 = id >> (3 - i) & 1 != 0;
    }
    for i in 0..4 {
        plan[13 + i].1 = data >> (15 - i) & 1 != 0;
    }
    for i in 0..12 {
        plan[6 + i].0 = data >> (11 - i) & 1 != 0;
    }
    esm_finish(plan)
}

/// Fill the CRC-6 slot (the first six b2 bits) over the interleaved pair
/// stream of the final twelve frames, the same window the decoder checks.
fn esm_finish(mut plan: [BitPair; 18]) -> [BitPair; 18] {
    let mut stream = 0u32;
    for pair in &plan[6..] {
        stream = (stream << 2) | (u32::from(pair.0) << 1) | u32::from(pair.1);
    }
    let crc = crc::crc6(stream);
    for i in 0..6 {
        plan[i].0 = crc >> (5 - i) & 1 != 0;
    }
    plan
}
