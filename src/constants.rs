/*!
Engine-wide constants. The fixed-point scales used throughout the crate
(16:16 Hz, 32:32 sample positions, 15:15 envelope values, 8:24 LFO phases)
are anchored to these values, so changing them is not a local edit.
!*/

/// Output sample rate in Hz. The mix is interleaved stereo signed 16-bit.
pub const SAMPLE_RATE: u32 = 48_000;

/// Size of the voice pool. Index 255 is reserved as the list terminator.
pub const MAX_VOICES: usize = 255;

/// Number of MIDI channels.
pub const MAX_CHANNELS: usize = 16;

/// The channel that defaults to percussion in General MIDI (zero-based).
pub const DRUM_CHANNEL_DEFAULT: usize = 9;

/// Envelopes, LFOs and the volume/pitch composites update once per this many
/// output frames.
pub const CONTROL_UPDATE_INTERVAL: u8 = 16;

/// Maximum number of frames mixed per chunk. Bounds the stack accumulator
/// used by the render loop.
pub const MAX_CHUNK_LENGTH: usize = 512;

/// Entries in the one-octave frequency lookup table.
pub const FREQS_SIZE: usize = 4096;

/// Entries in the sine table used by the tremolo and vibrato LFOs.
pub const SINES_SIZE: usize = 1024;

/// Entries in the envelope-to-amplitude curve table.
pub const ENVS_SIZE: usize = 1024;

/// Entries in the MIDI-value-to-amplitude curve table.
pub const VOLS_SIZE: usize = 128;
