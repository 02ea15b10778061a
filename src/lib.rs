/*!
A software General MIDI synthesizer.

`patchsynth` turns a Standard MIDI File and a set of Gravis Ultrasound
("GF1 PATCH") instrument files into interleaved stereo 16-bit PCM at
48 kHz. The [`file`] module decodes the three on-disk formats into the
[`core`] data model; the [`Player`] is a pull-based wavetable engine that
the audio host drives one buffer at a time.

```no_run
use patchsynth::{file, Player};

let mut player = Player::new();
player.load_config("patches/default.cfg")?;
player.play_sequence(file::load_sequence("song.mid")?);

let mut buffer = [0i16; 1024];
while player.currently_playing() {
    player.get_audio(&mut buffer);
    // hand the buffer to the sound device
}
# Ok::<(), patchsynth::Error>(())
```
!*/

#[macro_use]
mod error;
#[macro_use]
mod clamp;

mod byte_iter;
mod vlq;

pub mod constants;
pub mod core;
pub mod file;
mod player;

pub use crate::core::{Bank, Event, Patch, Sample, Sequence, TicksPerQuarter, TimedEvent};
pub use error::{Error, FileKind, Result};
pub use player::Player;
