/*!
The playback engine: a pull-based, single-owner wavetable synthesizer.

A [`Player`] owns a bank of patches, an optional [`Sequence`], sixteen
channels and a fixed pool of 255 voices. The audio host calls
[`Player::get_audio`] from its callback; everything else (loading, event
injection, transport) happens between calls. The render path neither blocks
nor allocates: the mix accumulator lives on the stack and voices move
between intrusive index-linked lists.
!*/

mod channel;
mod tables;
mod voice;

use crate::constants::{MAX_CHANNELS, MAX_CHUNK_LENGTH, MAX_VOICES, SAMPLE_RATE};
use crate::core::{common, control, kind, rpn, Bank, Event, Patch, Sequence};
use crate::error::Result;
use crate::file;
use channel::Channel;
use log::{debug, trace};
use std::path::Path;
use std::rc::Rc;
use voice::{StepResult, Voice, NO_VOICE};

/// A software General MIDI synthesizer.
///
/// Produces interleaved stereo signed 16-bit PCM at
/// [`SAMPLE_RATE`](crate::constants::SAMPLE_RATE). The realtime methods
/// ([`play_event`](Self::play_event), [`get_audio`](Self::get_audio)) never
/// fail: anomalies degrade to dropped events or silence.
pub struct Player {
    /// Output frames per tick at the current tempo. At least 1.
    tick_length: u32,
    seq: Option<Sequence>,
    banks: Vec<Bank>,
    /// Cursor into the sequence's event array.
    seq_pos: usize,
    samples_to_tick: u32,
    ticks_to_event: u32,
    done: bool,
    channels: [Channel; MAX_CHANNELS],
    /// Head of the inactive (free) voice list.
    inactive: u8,
    voices: Box<[Voice]>,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub fn new() -> Self {
        tables::tables();
        let mut player = Self {
            tick_length: 0,
            seq: None,
            banks: vec![Bank::new()],
            seq_pos: 0,
            samples_to_tick: 0,
            ticks_to_event: 0,
            done: false,
            channels: std::array::from_fn(Channel::new),
            inactive: 0,
            voices: vec![Voice::default(); MAX_VOICES].into_boxed_slice(),
        };
        player.reset_state();
        player
    }

    /// Return to a freshly constructed state, keeping the loaded banks.
    pub fn reset(&mut self) {
        self.reset_state();
        self.seq = None;
        self.seq_pos = 0;
        self.samples_to_tick = 0;
        self.ticks_to_event = 0;
        self.tick_length = 0;
        self.done = false;
    }

    /// Install a sequence and rewind to tick zero. The previous sequence,
    /// if any, is dropped; sounding voices keep ringing out.
    pub fn play_sequence(&mut self, seq: Sequence) {
        // 120 bpm until the sequence says otherwise
        self.tick_length = (SAMPLE_RATE / seq.tpb().get() as u32 / 2).max(1);
        self.samples_to_tick = self.tick_length;
        self.seq_pos = 0;
        self.done = seq.is_empty();
        self.ticks_to_event = seq.events().first().map(|e| e.time).unwrap_or(0);
        self.seq = Some(seq);
    }

    /// True while events remain to be dispatched or any voice is sounding.
    pub fn currently_playing(&self) -> bool {
        self.seq.is_some() && (!self.done || self.any_voice_active())
    }

    /// The number of currently sounding voices.
    pub fn active_voices(&self) -> usize {
        let mut count = 0;
        for ch in &self.channels {
            let mut cursor = ch.voices;
            while cursor != NO_VOICE {
                count += 1;
                cursor = self.voices[cursor as usize].next;
            }
        }
        count
    }

    /// Load a bank description file into bank 0.
    pub fn load_config<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.silence_all();
        let result = file::load_config(&mut self.banks[0], path);
        self.refresh_patches();
        result
    }

    /// Load a single patch file into a melodic slot of bank 0.
    pub fn load_patch<P: AsRef<Path>>(&mut self, program: u8, path: P) -> Result<()> {
        let patch = file::load_patch(path)?;
        self.set_patch(0, program, patch);
        Ok(())
    }

    /// Load a single patch file into a percussion slot of bank 0.
    pub fn load_drum<P: AsRef<Path>>(&mut self, note: u8, path: P) -> Result<()> {
        let patch = file::load_patch(path)?;
        self.set_drum(0, note, patch);
        Ok(())
    }

    /// Replace a whole bank. Sounding voices are reclaimed first so no
    /// voice renders from a patch its owner has dropped.
    pub fn set_bank(&mut self, bank_number: u8, bank: Bank) {
        self.silence_all();
        self.ensure_bank(bank_number);
        self.banks[bank_number as usize] = bank;
        self.refresh_patches();
    }

    /// Replace one melodic patch.
    pub fn set_patch(&mut self, bank_number: u8, program: u8, patch: Patch) {
        self.silence_all();
        self.ensure_bank(bank_number);
        self.banks[bank_number as usize].set_patch(program, Some(Rc::new(patch)));
        self.refresh_patches();
    }

    /// Replace one percussion patch.
    pub fn set_drum(&mut self, bank_number: u8, note: u8, patch: Patch) {
        self.silence_all();
        self.ensure_bank(bank_number);
        self.banks[bank_number as usize].set_drum(note, Some(Rc::new(patch)));
        self.refresh_patches();
    }

    /// Override the percussion flag of a channel.
    pub fn channel_set_drums(&mut self, channel: u8, is_drums: bool) {
        if let Some(ch) = self.channels.get_mut(channel as usize) {
            ch.is_drums = is_drums;
        }
    }

    pub fn channel_is_drums(&self, channel: u8) -> bool {
        self.channels
            .get(channel as usize)
            .map(|ch| ch.is_drums)
            .unwrap_or(false)
    }

    /// Dispatch a single event immediately, outside the sequence timeline.
    pub fn play_event(&mut self, event: Event) {
        self.do_event(&event);
    }

    /// Dispatch events until the next NOTE_ON is reached, then collapse the
    /// tick budget so the next [`get_audio`](Self::get_audio) call starts
    /// that note right away. Skips silent preambles of setup events.
    pub fn fast_forward_to_note(&mut self) {
        if self.seq.is_none() {
            return;
        }
        self.samples_to_tick = 1;
        self.ticks_to_event = 0;
        while !self.done {
            let next = match &self.seq {
                Some(seq) => match seq.events().get(self.seq_pos) {
                    Some(te) => te.event,
                    None => break,
                },
                None => return,
            };
            if next.kind == kind::NOTE_ON {
                break;
            }
            self.do_event(&next);
            self.seq_pos += 1;
            if self.seq_pos >= self.seq.as_ref().map(Sequence::len).unwrap_or(0) {
                self.done = true;
            }
        }
    }

    /// Fill `buf` with interleaved stereo frames. Produces silence when
    /// there is no sequence or playback has finished and every voice has
    /// ended.
    pub fn get_audio(&mut self, buf: &mut [i16]) {
        let frames = buf.len() / 2;
        if self.seq.is_none() || (self.done && !self.any_voice_active()) {
            buf.fill(0);
            return;
        }
        let mut chunk = [[0i32; 2]; MAX_CHUNK_LENGTH];
        let mut buf_pos = 0usize;
        while buf_pos < frames {
            // advance the event timeline
            if self.samples_to_tick == 0 {
                self.advance_tick();
            }
            let n = (self.samples_to_tick as usize)
                .min(frames - buf_pos)
                .min(MAX_CHUNK_LENGTH);
            // mix voices a whole chunk at a time; this is kinder to the
            // cache than interleaving voices per frame
            for frame in chunk[..n].iter_mut() {
                *frame = [0, 0];
            }
            for ci in 0..MAX_CHANNELS {
                self.render_channel(ci, &mut chunk[..n]);
            }
            self.samples_to_tick -= n as u32;
            for (i, frame) in chunk[..n].iter().enumerate() {
                buf[(buf_pos + i) * 2] = frame[0].clamp(-32768, 32767) as i16;
                buf[(buf_pos + i) * 2 + 1] = frame[1].clamp(-32768, 32767) as i16;
            }
            buf_pos += n;
        }
        if buf.len() % 2 == 1 {
            buf[buf.len() - 1] = 0;
        }
    }

    /// Byte-oriented variant of [`get_audio`](Self::get_audio): fills `buf`
    /// with little-endian interleaved stereo i16. `buf.len()` should be a
    /// multiple of 4.
    pub fn get_audio_bytes(&mut self, buf: &mut [u8]) {
        debug_assert_eq!(0, buf.len() % 4);
        let mut frames = [0i16; MAX_CHUNK_LENGTH * 2];
        for out in buf.chunks_mut(MAX_CHUNK_LENGTH * 4) {
            let samples = out.len() / 2;
            self.get_audio(&mut frames[..samples]);
            for (pair, sample) in out.chunks_exact_mut(2).zip(frames[..samples].iter()) {
                pair.copy_from_slice(&sample.to_le_bytes());
            }
        }
    }

    // ----- event dispatch -----

    fn do_event(&mut self, event: &Event) {
        match event.kind {
            kind::NOTE_OFF => self.note_off(event.channel as usize & 0x0F, event.param1),
            kind::NOTE_ON => {
                let ci = event.channel as usize & 0x0F;
                if event.param2 == 0 {
                    // a NOTE_ON with zero velocity is a note off
                    self.note_off(ci, event.param1);
                } else {
                    self.note_on(ci, event.param1, event.param2);
                }
            }
            kind::CONTROLLER => {
                self.controller(event.channel as usize & 0x0F, event.param1, event.param2)
            }
            kind::PROGRAM_CHANGE => {
                // in-flight voices keep their old patch and ring out
                let ci = event.channel as usize & 0x0F;
                self.channels[ci].program = event.param1;
                let resolved = self.lookup_patch(self.channels[ci].bank, event.param1);
                self.channels[ci].patch = resolved;
            }
            kind::PITCH_BEND => {
                let ci = event.channel as usize & 0x0F;
                self.channels[ci].pitch_bend =
                    ((event.param2 as i16) << 7 | event.param1 as i16) - 0x2000;
            }
            kind::COMMON => {
                if event.channel == common::RESET {
                    self.reset_state();
                }
            }
            kind::SET_TEMPO => {
                let us_per_beat = (event.channel as u32) << 16
                    | (event.param1 as u32) << 8
                    | event.param2 as u32;
                if let Some(seq) = &self.seq {
                    self.tick_length = ((SAMPLE_RATE as u64 * us_per_beat as u64 / 1_000_000)
                        / seq.tpb().get() as u64)
                        .max(1) as u32;
                    trace!("tempo {} us/beat, tick {} frames", us_per_beat, self.tick_length);
                }
            }
            // aftertouch and the rest of the common family are no-ops
            _ => {}
        }
    }

    fn note_off(&mut self, ci: usize, note: u8) {
        if self.channels[ci].is_drums {
            return;
        }
        let mut cursor = self.channels[ci].voices;
        while cursor != NO_VOICE {
            let v = &mut self.voices[cursor as usize];
            if v.note == note && v.envelope_phase < 3 {
                // only the first match releases; unison stacks shed one
                // voice per note off
                v.envelope_phase = 3;
                break;
            }
            cursor = v.next;
        }
    }

    fn note_on(&mut self, ci: usize, note: u8, velocity: u8) {
        let slot = self.inactive;
        if slot == NO_VOICE {
            debug!("voice pool exhausted, dropping note {}", note);
            return;
        }
        let is_drums = self.channels[ci].is_drums;
        let patch = if is_drums {
            self.lookup_drum(self.channels[ci].bank, note)
        } else {
            self.channels[ci].patch.clone()
        };
        let head = self.channels[ci].voices;
        let v = &mut self.voices[slot as usize];
        self.inactive = v.next;
        v.start(note, velocity);
        v.next = head;
        self.channels[ci].voices = slot;
        match patch {
            Some(p) if !p.samples.is_empty() => {
                let t = tables::tables();
                v.patch_volume = p.volume;
                v.do_envelope = !is_drums || p.keep_envelope;
                let mut sounding = note;
                if p.note >= 0 {
                    sounding = p.note as u8;
                }
                v.pitch = (sounding as i32) << 16;
                // pick the first sample whose range reaches the target
                // frequency, falling back to the last
                let freq = t.freq(v.pitch);
                let mut index = p.samples.len() - 1;
                for (i, s) in p.samples.iter().enumerate() {
                    if s.high_freq > freq {
                        index = i;
                        break;
                    }
                }
                let s = &p.samples[index];
                v.do_loop = s.looping && (!is_drums || p.keep_loop);
                if s.scale_factor != 1024 {
                    // keyboard scaling: stretch the distance from the scale
                    // note by factor/1024
                    let distance = v.pitch - ((s.scale_note as i32) << 16);
                    v.pitch += (distance as i64 * (s.scale_factor as i64 - 1024) / 1024) as i32;
                }
                v.sample_index = index as u8;
                v.patch = Some(p);
            }
            _ => {
                v.pitch = (note as i32) << 16;
            }
        }
    }

    fn controller(&mut self, ci: usize, number: u8, value: u8) {
        let ch = &mut self.channels[ci];
        match number {
            control::BANK_SELECT => ch.bank = value,
            control::VOLUME => ch.volume = value,
            control::PAN => ch.pan = value as i8 - 64,
            control::EXPRESSION => ch.expression = value,
            control::DATA_ENTRY_MSB => {
                if ch.rpn == rpn::PITCH_BEND_RANGE {
                    ch.pitch_bend_sensitivity = (value as u32) << 16;
                }
            }
            control::DATA_ENTRY_LSB => {
                if ch.rpn == rpn::PITCH_BEND_RANGE {
                    let cents = value.min(99) as u32;
                    ch.pitch_bend_sensitivity =
                        (ch.pitch_bend_sensitivity & 0xFFFF_0000) | (cents << 16) / 100;
                }
            }
            control::RPN_LSB => ch.rpn = (ch.rpn & !0x7F) | value as u16,
            control::RPN_MSB => ch.rpn = (ch.rpn & 0x7F) | (value as u16) << 7,
            control::ALL_SOUND_OFF => self.silence_channel(ci),
            control::ALL_CONTROLLERS_OFF => self.channels[ci].reset_controllers(),
            control::ALL_NOTES_OFF => self.release_channel(ci),
            // modulation, balance and NRPNs are accepted and ignored
            _ => {}
        }
    }

    /// COMMON/RESET: controllers, drum flags and the voice pool all return
    /// to their initial state. The sequence, cursor and bank are untouched.
    fn reset_state(&mut self) {
        for (i, ch) in self.channels.iter_mut().enumerate() {
            *ch = Channel::new(i);
        }
        for (i, v) in self.voices.iter_mut().enumerate() {
            *v = Voice::default();
            v.next = (i + 1) as u8;
        }
        self.inactive = 0;
        self.refresh_patches();
    }

    // ----- voice bookkeeping -----

    fn any_voice_active(&self) -> bool {
        self.channels.iter().any(|ch| ch.voices != NO_VOICE)
    }

    /// Immediately reclaim every voice on a channel (ALL_SOUND_OFF).
    fn silence_channel(&mut self, ci: usize) {
        let mut cursor = self.channels[ci].voices;
        while cursor != NO_VOICE {
            let v = &mut self.voices[cursor as usize];
            let next = v.next;
            v.patch = None;
            v.next = self.inactive;
            self.inactive = cursor;
            cursor = next;
        }
        self.channels[ci].voices = NO_VOICE;
    }

    fn silence_all(&mut self) {
        for ci in 0..MAX_CHANNELS {
            self.silence_channel(ci);
        }
    }

    /// Put every voice on a channel into release (ALL_NOTES_OFF).
    fn release_channel(&mut self, ci: usize) {
        let mut cursor = self.channels[ci].voices;
        while cursor != NO_VOICE {
            let v = &mut self.voices[cursor as usize];
            if v.envelope_phase < 3 {
                v.envelope_phase = 3;
            }
            cursor = v.next;
        }
    }

    // ----- bank plumbing -----

    fn ensure_bank(&mut self, bank_number: u8) {
        while self.banks.len() <= bank_number as usize {
            self.banks.push(Bank::new());
        }
    }

    fn lookup_patch(&self, bank_number: u8, program: u8) -> Option<Rc<Patch>> {
        self.banks
            .get(bank_number as usize)
            .and_then(|b| b.patch(program))
            .cloned()
    }

    fn lookup_drum(&self, bank_number: u8, note: u8) -> Option<Rc<Patch>> {
        self.banks
            .get(bank_number as usize)
            .and_then(|b| b.drum(note))
            .cloned()
    }

    /// Re-resolve every channel's cached patch after a bank edit.
    fn refresh_patches(&mut self) {
        for ci in 0..MAX_CHANNELS {
            let (bank, program) = (self.channels[ci].bank, self.channels[ci].program);
            let resolved = self.lookup_patch(bank, program);
            self.channels[ci].patch = resolved;
        }
    }

    // ----- tick clock and mixing -----

    /// Dispatch every event due on the current tick, then arm the clock for
    /// the next tick.
    fn advance_tick(&mut self) {
        while !self.done && self.ticks_to_event == 0 {
            let (event, delta_to_next) = match &self.seq {
                Some(seq) => {
                    let events = seq.events();
                    let te = events[self.seq_pos];
                    let delta = events.get(self.seq_pos + 1).map(|n| n.time - te.time);
                    (te.event, delta)
                }
                None => return,
            };
            self.do_event(&event);
            self.seq_pos += 1;
            match delta_to_next {
                Some(delta) => self.ticks_to_event = delta,
                None => self.done = true,
            }
        }
        if !self.done {
            self.ticks_to_event -= 1;
        }
        self.samples_to_tick = self.tick_length;
    }

    /// Walk one channel's voice list, mixing each voice and unlinking the
    /// ones whose step reported deletion.
    fn render_channel(&mut self, ci: usize, chunk: &mut [[i32; 2]]) {
        let state = self.channels[ci].state();
        let mut prev = NO_VOICE;
        let mut cursor = self.channels[ci].voices;
        while cursor != NO_VOICE {
            let v = &mut self.voices[cursor as usize];
            let next = v.next;
            match v.render(&state, chunk) {
                StepResult::Continue => prev = cursor,
                StepResult::Delete => {
                    if prev == NO_VOICE {
                        self.channels[ci].voices = next;
                    } else {
                        self.voices[prev as usize].next = next;
                    }
                    let v = &mut self.voices[cursor as usize];
                    v.patch = None;
                    v.next = self.inactive;
                    self.inactive = cursor;
                }
            }
            cursor = next;
        }
    }
}
