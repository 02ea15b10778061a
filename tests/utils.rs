// Shared fixture builders for the integration tests. Not every test file
// uses every helper.
#![allow(dead_code)]

use std::sync::Once;

pub fn enable_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub const END_OF_TRACK: &[u8] = &[0x00, 0xFF, 0x2F, 0x00];

/// Wrap raw event bytes in an MTrk chunk.
pub fn smf_track(event_bytes: &[&[u8]]) -> Vec<u8> {
    let mut body = Vec::new();
    for e in event_bytes {
        body.extend_from_slice(e);
    }
    let mut out = b"MTrk".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend(body);
    out
}

/// Assemble a complete Standard MIDI File.
pub fn smf_bytes(division: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = b"MThd".to_vec();
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    out.extend_from_slice(&division.to_be_bytes());
    for t in tracks {
        out.extend_from_slice(t);
    }
    out
}

/// Everything needed to write one GF1 sample record.
pub struct SampleSpec {
    pub data: Vec<i16>,
    pub fractions: u8,
    pub loop_start_bytes: u32,
    pub loop_end_bytes: u32,
    pub native_rate: u16,
    pub low_milli_hz: u32,
    pub high_milli_hz: u32,
    pub root_milli_hz: u32,
    pub envelope_rates: [u8; 6],
    pub envelope_offsets: [u8; 6],
    pub tremolo: [u8; 3],
    pub vibrato: [u8; 3],
    pub modes: u8,
    pub scale_note: u16,
    pub scale_factor: u16,
}

pub const MODE_BITS16: u8 = 0x01;
pub const MODE_LOOPING: u8 = 0x04;
pub const MODE_PINGPONG: u8 = 0x08;
pub const MODE_SUSTAIN: u8 = 0x20;

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            data: vec![0; 16],
            fractions: 0,
            loop_start_bytes: 0,
            loop_end_bytes: 32,
            native_rate: 48_000,
            low_milli_hz: 1_000,
            high_milli_hz: 20_000_000,
            root_milli_hz: 440_000,
            envelope_rates: [0x3F; 6],
            envelope_offsets: [251, 251, 251, 10, 10, 10],
            tremolo: [0, 0, 0],
            vibrato: [0, 0, 0],
            modes: MODE_BITS16,
            scale_note: 60,
            scale_factor: 1024,
        }
    }
}

impl SampleSpec {
    /// One cycle of a square wave, looped and sustained: a steady,
    /// frequency-measurable tone.
    pub fn square_cycle(cycle_len: usize, root_milli_hz: u32) -> Self {
        let data: Vec<i16> = (0..cycle_len)
            .map(|i| if i < cycle_len / 2 { 16384 } else { -16384 })
            .collect();
        Self {
            loop_end_bytes: (cycle_len * 2) as u32,
            root_milli_hz,
            data,
            modes: MODE_BITS16 | MODE_LOOPING | MODE_SUSTAIN,
            ..Self::default()
        }
    }
}

/// Assemble a complete GF1 PATCH file.
pub fn patch_bytes(volume: u16, samples: &[SampleSpec]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"GF1PATCH1");
    out.push(b'1');
    out.extend_from_slice(b"0\x00ID#000002\x00");
    out.extend_from_slice(&[0; 60]); // description
    out.push(1); // instruments
    out.push(0); // voices
    out.push(0); // channels
    out.extend_from_slice(&[0; 2]); // waveforms
    out.extend_from_slice(&volume.to_le_bytes());
    out.extend_from_slice(&[0; 4]); // data size
    out.extend_from_slice(&[0; 36]); // reserved
    out.extend_from_slice(&0u16.to_le_bytes()); // instrument id
    out.extend_from_slice(&[0; 16]); // instrument name
    out.extend_from_slice(&[0; 4]); // instrument size
    out.push(1); // layers
    out.extend_from_slice(&[0; 40]); // reserved
    out.push(0); // layer duplicate
    out.push(0); // layer id
    out.extend_from_slice(&[0; 4]); // layer size
    out.push(samples.len() as u8);
    out.extend_from_slice(&[0; 40]); // reserved
    for s in samples {
        out.extend_from_slice(&[0; 7]); // wave name
        out.push(s.fractions);
        out.extend_from_slice(&((s.data.len() * 2) as u32).to_le_bytes());
        out.extend_from_slice(&s.loop_start_bytes.to_le_bytes());
        out.extend_from_slice(&s.loop_end_bytes.to_le_bytes());
        out.extend_from_slice(&s.native_rate.to_le_bytes());
        out.extend_from_slice(&s.low_milli_hz.to_le_bytes());
        out.extend_from_slice(&s.high_milli_hz.to_le_bytes());
        out.extend_from_slice(&s.root_milli_hz.to_le_bytes());
        out.extend_from_slice(&[0; 2]); // tune
        out.push(7); // pan
        out.extend_from_slice(&s.envelope_rates);
        out.extend_from_slice(&s.envelope_offsets);
        out.extend_from_slice(&s.tremolo);
        out.extend_from_slice(&s.vibrato);
        out.push(s.modes);
        out.extend_from_slice(&s.scale_note.to_le_bytes());
        out.extend_from_slice(&s.scale_factor.to_le_bytes());
        out.extend_from_slice(&[0; 36]); // reserved
        for value in &s.data {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out
}
