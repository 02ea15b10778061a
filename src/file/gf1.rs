use crate::byte_iter::ByteIter;
use crate::constants::SAMPLE_RATE;
use crate::core::{sampling_modes, Patch, Sample};
use crate::error::{FileKind, LibResult, Result};
use log::{debug, trace};
use snafu::ResultExt;
use std::io::Read;
use std::path::Path;

/// Parse a GF1 PATCH file from a reader into a [`Patch`].
///
/// All multi-byte fields are little-endian. Frequencies arrive in milli-Hz
/// and leave in 16:16 Hz; loop points arrive as byte offsets with nibble
/// fractions and leave as 32:32 sample positions; envelope and LFO rates are
/// normalized to the 48 kHz output rate. Only 16-bit forward-playing
/// samples are supported.
pub fn read_patch<R: Read>(r: R) -> Result<Patch> {
    let iter = ByteIter::new(r.bytes()).context(io!())?;
    Ok(read_inner(iter)?)
}

/// Parse a GF1 PATCH file on disk into a [`Patch`].
pub fn load_patch<P: AsRef<Path>>(path: P) -> Result<Patch> {
    Ok(load_inner(path)?)
}

pub(crate) fn load_inner<P: AsRef<Path>>(path: P) -> LibResult<Patch> {
    read_inner(ByteIter::new_file(path).context(io!())?)
}

fn read_inner<R: Read>(mut iter: ByteIter<R>) -> LibResult<Patch> {
    trace!("parsing patch header");
    iter.expect_bytes(b"GF1PATCH1").context(io!())?;
    // second digit of the header version, 100 or 110
    iter.skip(1).context(io!())?;
    iter.expect_bytes(b"0\x00ID#000002\x00").context(io!())?;
    iter.skip(60).context(io!())?; // description
    let instruments = iter.read_or_die().context(io!())?;
    if instruments > 1 {
        invalid_data!(
            FileKind::Gf1Patch,
            "{} instruments instead of at most 1",
            instruments
        );
    }
    iter.skip(1).context(io!())?; // voices
    iter.skip(1).context(io!())?; // channels
    iter.skip(2).context(io!())?; // waveforms
    let mut patch = Patch {
        volume: iter.read_u16_le().context(io!())?,
        ..Patch::default()
    };
    iter.skip(4).context(io!())?; // data size
    iter.skip(36).context(io!())?; // reserved
    let instrument_id = iter.read_u16_le().context(io!())?;
    if instrument_id != 0 {
        invalid_data!(
            FileKind::Gf1Patch,
            "instrument id {:#06x} instead of 0",
            instrument_id
        );
    }
    iter.skip(16).context(io!())?; // instrument name
    iter.skip(4).context(io!())?; // instrument size
    let layers = iter.read_or_die().context(io!())?;
    if layers != 1 {
        invalid_data!(FileKind::Gf1Patch, "{} layers instead of 1", layers);
    }
    iter.skip(40).context(io!())?; // reserved
    let layer_duplicate = iter.read_or_die().context(io!())?;
    if layer_duplicate != 0 {
        invalid_data!(FileKind::Gf1Patch, "nonzero layer duplicate byte");
    }
    let layer_id = iter.read_or_die().context(io!())?;
    if layer_id != 0 {
        invalid_data!(FileKind::Gf1Patch, "nonzero layer id byte");
    }
    iter.skip(4).context(io!())?; // layer size
    let n_samples = iter.read_or_die().context(io!())?;
    iter.skip(40).context(io!())?; // reserved
    debug!("patch volume {}, {} samples", patch.volume, n_samples);
    for _ in 0..n_samples {
        patch.samples.push(read_sample(&mut iter)?);
    }
    Ok(patch)
}

fn read_sample<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Sample> {
    iter.skip(7).context(io!())?; // wave name
    let fractions = iter.read_or_die().context(io!())?;
    let data_bytes = iter.read_u32_le().context(io!())?;
    // only 16-bit samples survive the checks below, so bytes are half-words
    let data_size = (data_bytes / 2) as usize;
    let raw_loop_start = iter.read_u32_le().context(io!())? as i64;
    let raw_loop_end = iter.read_u32_le().context(io!())? as i64;
    // the fraction nibbles are sixteenths of a byte position; halving turns
    // byte offsets into sample positions
    let mut loop_start =
        (raw_loop_start * 0x1_0000_0000 + ((fractions & 0x0F) as i64) * 0x1000_0000) / 2;
    let mut loop_end =
        (raw_loop_end * 0x1_0000_0000 + (((fractions >> 4) & 0x0F) as i64) * 0x1000_0000) / 2;
    let native_rate = iter.read_u16_le().context(io!())?;
    let sample_inc = native_rate as i64 * 0x1_0000_0000 / SAMPLE_RATE as i64;
    let low_freq = milli_hz_to_fixed(iter.read_u32_le().context(io!())?);
    let high_freq = milli_hz_to_fixed(iter.read_u32_le().context(io!())?);
    let root_freq = milli_hz_to_fixed(iter.read_u32_le().context(io!())?);
    if root_freq == 0 {
        invalid_data!(FileKind::Gf1Patch, "root frequency of zero");
    }
    iter.skip(2).context(io!())?; // tune
    let pan = iter.read_or_die().context(io!())?;
    let mut envelope_rates = [0u32; 6];
    for rate in envelope_rates.iter_mut() {
        // 6-bit mantissa with a 2-bit exponent selecting one of four octave
        // shifts, normalized from the 44.1 kHz reference rate, then widened
        // into 15:15
        let byte = iter.read_or_die().context(io!())?;
        let val = ((byte & 0x3F) as u32) << (3 * (3 - ((byte >> 6) & 3) as u32));
        *rate = (val * 44_100 / SAMPLE_RATE) << 9;
    }
    let mut envelope_offsets = [0u32; 6];
    for offset in envelope_offsets.iter_mut() {
        *offset = (iter.read_or_die().context(io!())? as u32) << 22;
    }
    // The 38s are a conventional scaling constant for GUS LFOs; larger
    // values make the sweep and oscillation slower.
    let tremolo_sweep = iter.read_or_die().context(io!())? as u32;
    let tremolo_sweep_inc = sweep_increment(tremolo_sweep);
    let tremolo_rate = iter.read_or_die().context(io!())? as u32;
    let tremolo_phase_inc = phase_increment(tremolo_rate);
    let tremolo_depth = iter.read_or_die().context(io!())? as i16;
    let vibrato_sweep = iter.read_or_die().context(io!())? as u32;
    let vibrato_sweep_inc = sweep_increment(vibrato_sweep);
    let vibrato_rate = iter.read_or_die().context(io!())? as u32;
    let vibrato_phase_inc = phase_increment(vibrato_rate);
    let vibrato_depth = iter.read_or_die().context(io!())? as i16;
    let modes = iter.read_or_die().context(io!())?;
    let scale_note = iter.read_u16_le().context(io!())?.min(127) as u8;
    let scale_factor = iter.read_u16_le().context(io!())?;
    iter.skip(36).context(io!())?; // reserved
    if modes & sampling_modes::BITS16 == 0 {
        unsupported!("8-bit patch samples");
    }
    if modes & sampling_modes::REVERSE != 0 {
        unsupported!("reverse-playback patch samples");
    }
    let mut data = Vec::with_capacity(data_size + 1);
    for _ in 0..data_size {
        let raw = iter.read_u16_le().context(io!())?;
        let raw = if modes & sampling_modes::UNSIGNED != 0 {
            raw ^ 0x8000
        } else {
            raw
        };
        data.push(raw as i16);
    }
    // guard copy so linear interpolation may read one past the end
    data.push(data.last().copied().unwrap_or(0));
    // keep the loop inside the data so every reachable position interpolates
    // in bounds
    let max_pos = (data_size as i64) << 32;
    loop_end = loop_end.clamp(0, max_pos);
    loop_start = loop_start.clamp(0, loop_end);
    let looping = modes & sampling_modes::LOOPING != 0 && loop_end > loop_start;
    Ok(Sample {
        low_freq,
        high_freq,
        root_freq,
        loop_start,
        loop_end,
        sample_inc,
        envelope_rates,
        envelope_offsets,
        tremolo_sweep_inc,
        tremolo_phase_inc,
        tremolo_depth,
        vibrato_sweep_inc,
        vibrato_phase_inc,
        vibrato_depth,
        looping,
        pingpong: modes & sampling_modes::PINGPONG != 0,
        sustain: modes & sampling_modes::SUSTAIN != 0,
        scale_note,
        scale_factor,
        pan,
        data,
    })
}

fn milli_hz_to_fixed(milli_hz: u32) -> u32 {
    (milli_hz as u64 * 0x10000 / 1000).min(u32::MAX as u64) as u32
}

fn sweep_increment(sweep: u32) -> i32 {
    if sweep == 0 {
        0
    } else {
        (38 * 0x100_0000 / (SAMPLE_RATE * sweep)) as i32
    }
}

fn phase_increment(rate: u32) -> i32 {
    (rate as u64 * 0x100_0000 / (38 * SAMPLE_RATE) as u64) as i32
}
