/*!
The `core` module holds the types the playback engine operates on: events,
sequences, and instrument patches. These are independent of any particular
file format; the `file` module decodes the on-disk formats into them.
!*/

mod event;
mod patch;
mod sequence;

pub use event::{common, control, kind, rpn, Event};
pub use patch::{sampling_modes, Bank, Patch, Sample};
pub use sequence::{Sequence, TicksPerQuarter, TimedEvent};
