use crate::constants::{CONTROL_UPDATE_INTERVAL, SAMPLE_RATE};
use crate::core::{Patch, Sample};
use crate::player::channel::ChannelState;
use crate::player::tables::{tables, Tables};
use std::rc::Rc;

/// Voice-list terminator. Voice indices are 0..=254.
pub(crate) const NO_VOICE: u8 = 255;

/// What the list walk should do with a voice after stepping it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum StepResult {
    Continue,
    /// Unlink the voice and return it to the inactive pool.
    Delete,
}

/// One sounding note: a cursor into a patch sample plus envelope and LFO
/// state. Voices are pool-allocated and chained by `next` into exactly one
/// list at a time, either a channel's active list or the inactive list.
#[derive(Clone, Debug, Default)]
pub(crate) struct Voice {
    pub(crate) next: u8,
    /// The MIDI note as received; NOTE_OFF matches against this.
    pub(crate) note: u8,
    pub(crate) velocity: u8,
    pub(crate) patch: Option<Rc<Patch>>,
    pub(crate) sample_index: u8,
    pub(crate) backwards: bool,
    /// False on drum channels unless the patch keeps its envelope.
    pub(crate) do_envelope: bool,
    /// False for unlooped samples and on drum channels unless kept.
    pub(crate) do_loop: bool,
    /// 0..=5; 3 is entered by NOTE_OFF.
    pub(crate) envelope_phase: u8,
    /// 15:15.
    pub(crate) envelope_value: u32,
    /// LFO state, 8:24.
    pub(crate) tremolo_sweep: i32,
    pub(crate) tremolo_phase: i32,
    pub(crate) vibrato_sweep: i32,
    pub(crate) vibrato_phase: i32,
    /// Channel volume*expression, cached so releasing notes keep their
    /// level when the channel moves on.
    pub(crate) channel_volume: u32,
    /// Composite amplitude, 16:16.
    pub(crate) volume: u32,
    /// Patch master volume snapshot from note-on.
    pub(crate) patch_volume: u16,
    /// Sounding pitch in 16:16 semitones after fixed-note override and
    /// keyboard scaling; may differ fractionally from `note`.
    pub(crate) pitch: i32,
    /// Counts down to the next control update.
    pub(crate) control_timer: u8,
    /// 32:32 position and per-frame delta. Signed to make the reflection
    /// math painless.
    pub(crate) sample_pos: i64,
    pub(crate) sample_inc: i64,
}

impl Voice {
    /// Reinitialize for a fresh note. The caller wires `next` and the
    /// patch-dependent fields.
    pub(crate) fn start(&mut self, note: u8, velocity: u8) {
        let next = self.next;
        *self = Self {
            next,
            note,
            velocity,
            control_timer: 1,
            ..Self::default()
        };
    }

    /// Mix this voice into `chunk`, stepping envelopes, LFOs and the sample
    /// cursor. The chunk is at most `MAX_CHUNK_LENGTH` frames.
    pub(crate) fn render(&mut self, ch: &ChannelState, chunk: &mut [[i32; 2]]) -> StepResult {
        let t = tables();
        match self.patch.clone() {
            Some(patch) => self.render_sample(&patch, ch, t, chunk),
            None => self.render_square(ch, t, chunk),
        }
    }

    fn render_sample(
        &mut self,
        patch: &Patch,
        ch: &ChannelState,
        t: &Tables,
        chunk: &mut [[i32; 2]],
    ) -> StepResult {
        let sample = &patch.samples[self.sample_index as usize];
        for frame in chunk.iter_mut() {
            self.control_timer -= 1;
            if self.control_timer == 0 {
                self.control_timer = CONTROL_UPDATE_INTERVAL;
                if let StepResult::Delete = self.control_update(sample, ch, t) {
                    return StepResult::Delete;
                }
            }
            // linear interpolation; the guard sample makes high+1 safe
            let high = (self.sample_pos >> 32) as usize;
            let low = self.sample_pos & 0xFFFF_FFFF;
            let interpolated = sample.data[high] as i64 * (0x1_0000_0000 - low)
                + sample.data[high + 1] as i64 * low;
            let value = (interpolated / 0x1_0000_0000 * self.volume as i64 / 0x10000) as i32;
            frame[0] = frame[0].saturating_add(value * (64 + ch.pan as i32) / 64);
            frame[1] = frame[1].saturating_add(value * (64 - ch.pan as i32) / 64);
            // advance, then resolve loop-boundary crossings
            if self.backwards {
                self.sample_pos -= self.sample_inc;
                if self.sample_pos <= sample.loop_start {
                    if !self.do_loop {
                        return StepResult::Delete;
                    }
                    self.backwards = false;
                    self.sample_pos = (2 * sample.loop_start - self.sample_pos)
                        .clamp(sample.loop_start, sample.loop_end - 1);
                }
            } else {
                self.sample_pos += self.sample_inc;
                if self.sample_pos >= sample.loop_end {
                    if !self.do_loop {
                        return StepResult::Delete;
                    }
                    if sample.pingpong {
                        self.backwards = true;
                        self.sample_pos = (2 * sample.loop_end - self.sample_pos)
                            .clamp(sample.loop_start, sample.loop_end - 1);
                    } else {
                        let length = sample.loop_end - sample.loop_start;
                        while self.sample_pos >= sample.loop_end {
                            self.sample_pos -= length;
                        }
                    }
                }
            }
        }
        StepResult::Continue
    }

    /// Envelope, LFOs, cached volumes and the pitch composite. Runs once per
    /// [`CONTROL_UPDATE_INTERVAL`] frames.
    fn control_update(&mut self, sample: &Sample, ch: &ChannelState, t: &Tables) -> StepResult {
        let interval = CONTROL_UPDATE_INTERVAL as u32;
        if !self.do_envelope {
            self.envelope_value = 0x3FF0_0000;
        } else {
            let rate = sample.envelope_rates[self.envelope_phase as usize].saturating_mul(interval);
            let target = sample.envelope_offsets[self.envelope_phase as usize];
            if target > self.envelope_value {
                // getting louder
                if self.envelope_value.saturating_add(rate) < target {
                    self.envelope_value += rate;
                } else if self.envelope_phase == 5 {
                    return StepResult::Delete;
                } else {
                    self.envelope_value = target;
                    if !(self.envelope_phase == 2 && sample.sustain) {
                        self.envelope_phase += 1;
                    }
                }
            } else {
                // getting quieter
                if target.saturating_add(rate) < self.envelope_value {
                    self.envelope_value -= rate;
                } else if self.envelope_phase == 5 || target == 0 {
                    return StepResult::Delete;
                } else {
                    self.envelope_value = target;
                    if !(self.envelope_phase == 2 && sample.sustain) {
                        self.envelope_phase += 1;
                    }
                }
            }
        }
        // tremolo: the sweep ramps the depth in, the phase spins the sine
        self.tremolo_sweep =
            (self.tremolo_sweep + sample.tremolo_sweep_inc * interval as i32).min(0x100_0000);
        self.tremolo_phase += sample.tremolo_phase_inc * interval as i32;
        if self.tremolo_phase >= 0x100_0000 {
            self.tremolo_phase -= 0x100_0000;
        }
        let tremolo = (sample.tremolo_depth as i64 * self.tremolo_sweep as i64 / 0x2_0000
            * t.sine(self.tremolo_phase) as i64
            / 0x8000) as i32;
        // the channel level is frozen once release begins
        if self.envelope_phase < 3 {
            self.channel_volume = t.vol(ch.volume) * t.vol(ch.expression) / 0x10000;
        }
        let volume = self.patch_volume as i64 * 0x100 * self.channel_volume as i64 / 0x10000
            * t.vol(self.velocity) as i64
            / 0x10000
            * t.env(self.envelope_value) as i64
            / 0x10000
            * (0x10000 + tremolo as i64)
            / 0x10000;
        self.volume = volume.max(0) as u32;
        // vibrato
        self.vibrato_sweep =
            (self.vibrato_sweep + sample.vibrato_sweep_inc * interval as i32).min(0x100_0000);
        self.vibrato_phase += sample.vibrato_phase_inc * interval as i32;
        if self.vibrato_phase >= 0x100_0000 {
            self.vibrato_phase -= 0x100_0000;
        }
        let vibrato = (sample.vibrato_depth as i64 * self.vibrato_sweep as i64 / 0x2_0000
            * t.sine(self.vibrato_phase) as i64
            / 0x8000) as i32;
        // notes are logarithmic, so pitch offsets add
        let bend = (ch.pitch_bend as i64 * ch.pitch_bend_sensitivity as i64 / 0x2000) as i32;
        let note_q = self.pitch + bend + vibrato * 4;
        self.sample_inc =
            (sample.sample_inc as i128 * t.freq(note_q) as i128 / sample.root_freq as i128) as i64;
        StepResult::Continue
    }

    /// No patch: a quiet square wave so the sequence is still audible.
    fn render_square(&mut self, ch: &ChannelState, t: &Tables, chunk: &mut [[i32; 2]]) -> StepResult {
        // square voices have no envelope to ring out; release ends them
        if self.envelope_phase >= 3 {
            return StepResult::Delete;
        }
        let freq = t.freq((self.note as i32) << 16);
        let increment = ((freq as i64) << 16) / SAMPLE_RATE as i64;
        for frame in chunk.iter_mut() {
            self.sample_pos %= 0x1_0000_0000;
            let sign: i32 = if self.sample_pos < 0x8000_0000 { -1 } else { 1 };
            let value =
                sign * (self.velocity as i32 * ch.volume as i32 * ch.expression as i32) / (32 * 127);
            frame[0] = frame[0].saturating_add(value);
            frame[1] = frame[1].saturating_add(value);
            self.sample_pos += increment;
        }
        StepResult::Continue
    }
}
