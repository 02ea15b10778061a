use std::rc::Rc;

/// Sampling-mode flag bits from the GF1 sample record.
pub mod sampling_modes {
    pub const BITS16: u8 = 0x01;
    pub const UNSIGNED: u8 = 0x02;
    pub const LOOPING: u8 = 0x04;
    pub const PINGPONG: u8 = 0x08;
    pub const REVERSE: u8 = 0x10;
    pub const SUSTAIN: u8 = 0x20;
    pub const ENVELOPE: u8 = 0x40;
    pub const CLAMPED_RELEASE: u8 = 0x80;
}

/// One wavetable belonging to a patch, ready to mix: all rate-dependent
/// fields are precomputed against the output rate in fixed point.
///
/// `data` always carries one extra copy of the final sample so that the
/// linear interpolator can read `data[i + 1]` for every reachable position.
#[derive(Clone, Debug, Default)]
pub struct Sample {
    /// Lowest frequency this wavetable is meant for, 16:16 Hz.
    pub low_freq: u32,
    /// Highest frequency this wavetable is meant for, 16:16 Hz.
    pub high_freq: u32,
    /// The frequency the waveform was recorded at, 16:16 Hz. Never zero.
    pub root_freq: u32,
    /// Loop bounds as 32:32 sample positions, clamped into the data.
    pub loop_start: i64,
    pub loop_end: i64,
    /// Position delta per output frame when playing at `root_freq`, 32:32.
    pub sample_inc: i64,
    /// Per-control-tick envelope increments, 15:15.
    pub envelope_rates: [u32; 6],
    /// Envelope ramp targets, 15:15.
    pub envelope_offsets: [u32; 6],
    /// LFO sweep/phase increments, 8:24.
    pub tremolo_sweep_inc: i32,
    pub tremolo_phase_inc: i32,
    pub tremolo_depth: i16,
    pub vibrato_sweep_inc: i32,
    pub vibrato_phase_inc: i32,
    pub vibrato_depth: i16,
    pub looping: bool,
    pub pingpong: bool,
    /// Hold the envelope at the sustain segment until release.
    pub sustain: bool,
    /// Keyboard scaling: the note a detune of zero refers to, and the
    /// per-key detune factor in 1/1024ths.
    pub scale_note: u8,
    pub scale_factor: u16,
    /// Per-sample pan from the file. Unused; channel pan wins.
    pub pan: u8,
    /// 16-bit signed PCM plus the trailing guard sample.
    pub data: Vec<i16>,
}

impl Sample {
    /// The number of real (non-guard) samples.
    pub fn data_size(&self) -> usize {
        self.data.len().saturating_sub(1)
    }
}

/// A multi-sample instrument definition. At note-on the engine picks the
/// first sample whose `high_freq` lies above the note's target frequency.
#[derive(Clone, Debug)]
pub struct Patch {
    /// Master volume from the file, possibly rescaled by a config `amp=`.
    pub volume: u16,
    /// Fixed note override; -1 plays the MIDI note as given.
    pub note: i8,
    /// Keep the sample loop even on a drum channel.
    pub keep_loop: bool,
    /// Keep the volume envelope even on a drum channel.
    pub keep_envelope: bool,
    pub samples: Vec<Sample>,
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            volume: 0,
            note: -1,
            keep_loop: false,
            keep_envelope: false,
            samples: Vec::new(),
        }
    }
}

/// A set of instrument assignments: 128 melodic slots indexed by program
/// number and 128 percussion slots indexed by note number. Patches are
/// reference counted so that sounding voices stay valid across replacement.
#[derive(Clone, Debug)]
pub struct Bank {
    patches: [Option<Rc<Patch>>; 128],
    drums: [Option<Rc<Patch>>; 128],
}

impl Default for Bank {
    fn default() -> Self {
        Self::new()
    }
}

impl Bank {
    pub fn new() -> Self {
        Self {
            patches: std::array::from_fn(|_| None),
            drums: std::array::from_fn(|_| None),
        }
    }

    pub fn patch(&self, program: u8) -> Option<&Rc<Patch>> {
        self.patches.get(program as usize).and_then(Option::as_ref)
    }

    pub fn drum(&self, note: u8) -> Option<&Rc<Patch>> {
        self.drums.get(note as usize).and_then(Option::as_ref)
    }

    /// Assign a melodic slot, dropping any previous patch. Out-of-range
    /// program numbers are ignored.
    pub fn set_patch(&mut self, program: u8, patch: Option<Rc<Patch>>) {
        if let Some(slot) = self.patches.get_mut(program as usize) {
            *slot = patch;
        }
    }

    /// Assign a percussion slot, dropping any previous patch.
    pub fn set_drum(&mut self, note: u8, patch: Option<Rc<Patch>>) {
        if let Some(slot) = self.drums.get_mut(note as usize) {
            *slot = patch;
        }
    }
}
