/*!
The `file` module decodes the three on-disk formats into `core` types:
Standard MIDI Files into [`Sequence`](crate::core::Sequence)s, GF1 PATCH
files into [`Patch`](crate::core::Patch)es, and bank description (`.cfg`)
files into [`Bank`](crate::core::Bank) assignments.

Decoding is strict where the engine depends on structure (chunk framing,
division format, sample bit depth) and permissive where it does not (meta
events, unknown controllers, unknown config options).
!*/

mod config;
mod gf1;
mod smf;

pub use config::load_config;
pub use gf1::{load_patch, read_patch};
pub use smf::{load_sequence, read_sequence};
