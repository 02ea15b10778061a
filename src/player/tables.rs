use crate::constants::{ENVS_SIZE, FREQS_SIZE, SINES_SIZE, VOLS_SIZE};
use std::sync::OnceLock;

/// Read-only lookup tables shared by every player. Built once on first use.
pub(crate) struct Tables {
    /// One octave of frequencies starting at MIDI note 0, 16:16 Hz.
    freqs: [u32; FREQS_SIZE],
    /// MIDI value 0..=127 to amplitude, 0..=0xFFFF. The exponent is the
    /// volume curve TiMidity uses.
    vols: [u16; VOLS_SIZE],
    /// One cycle of sine scaled by 0x8000.
    sines: [i32; SINES_SIZE],
    /// Envelope level (top ten bits of 15:15) to amplitude: a 36 dB
    /// exponential curve ending at 0xFFFF.
    envs: [u16; ENVS_SIZE],
}

static TABLES: OnceLock<Tables> = OnceLock::new();

pub(crate) fn tables() -> &'static Tables {
    TABLES.get_or_init(Tables::build)
}

/// MIDI note 0 in Hz: 440 * 2^(-69/12).
const NOTE_ZERO_HZ: f64 = 8.175_798_915_643_707;

const VOLUME_EXPONENT: f64 = 1.660_964_047_44;

impl Tables {
    fn build() -> Self {
        let mut freqs = [0u32; FREQS_SIZE];
        for (i, entry) in freqs.iter_mut().enumerate() {
            let octave_fraction = i as f64 / FREQS_SIZE as f64;
            *entry = (NOTE_ZERO_HZ * f64::powf(2.0, octave_fraction) * 65536.0) as u32;
        }
        let mut vols = [0u16; VOLS_SIZE];
        for (i, entry) in vols.iter_mut().enumerate() {
            *entry = (65535.0 * f64::powf(i as f64 / 127.0, VOLUME_EXPONENT)) as u16;
        }
        let mut sines = [0i32; SINES_SIZE];
        for (i, entry) in sines.iter_mut().enumerate() {
            let angle = 2.0 * std::f64::consts::PI * i as f64 / SINES_SIZE as f64;
            *entry = (angle.sin() * 32768.0).round() as i32;
        }
        let mut envs = [0u16; ENVS_SIZE];
        for (i, entry) in envs.iter_mut().enumerate() {
            let exponent = (i as f64 / (ENVS_SIZE - 1) as f64 - 1.0) * 6.0;
            *entry = (65535.0 * f64::powf(2.0, exponent)) as u16;
        }
        Self {
            freqs,
            vols,
            sines,
            envs,
        }
    }

    /// Frequency of a 16:16 note number, in 16:16 Hz. One octave is stored;
    /// higher octaves are a left shift. Saturates instead of overflowing for
    /// notes pushed out of range by extreme bends.
    pub(crate) fn freq(&self, note: i32) -> u32 {
        let note = note.max(0) as u64;
        let step = note * FREQS_SIZE as u64 / (12 << 16);
        let octave = (step / FREQS_SIZE as u64).min(31) as u32;
        let base = self.freqs[(step % FREQS_SIZE as u64) as usize] as u64;
        (base << octave).min(u32::MAX as u64) as u32
    }

    /// Amplitude for a 7-bit MIDI value, 0..=0xFFFF.
    pub(crate) fn vol(&self, value: u8) -> u32 {
        self.vols[(value & 0x7F) as usize] as u32
    }

    /// Amplitude for a 15:15 envelope value, 0..=0xFFFF.
    pub(crate) fn env(&self, envelope_value: u32) -> u32 {
        self.envs[((envelope_value / 0x10_0000) as usize).min(ENVS_SIZE - 1)] as u32
    }

    /// Sine of an 8:24 phase, scaled by 0x8000.
    pub(crate) fn sine(&self, phase: i32) -> i32 {
        let index = (phase as u32 as usize / (0x100_0000 / SINES_SIZE)) % SINES_SIZE;
        self.sines[index]
    }
}
