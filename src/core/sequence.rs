use crate::core::Event;

// The SMF division word is 15 bits; the high bit selects SMPTE divisions,
// which this crate rejects. Zero would divide the tick clock by zero.
clamp!(TicksPerQuarter, u16, 1, 0x7fff, 480, pub);

/// An [`Event`] scheduled at an absolute time in ticks.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct TimedEvent {
    pub time: u32,
    pub event: Event,
}

/// A fully scheduled piece of music: ticks-per-quarter-note plus a densely
/// packed event array sorted by time. Events at equal times keep the order
/// they were given in (for SMF input, the original intra-track order).
#[derive(Clone, Debug, Default)]
pub struct Sequence {
    tpb: TicksPerQuarter,
    events: Vec<TimedEvent>,
}

impl Sequence {
    pub fn new(tpb: TicksPerQuarter, mut events: Vec<TimedEvent>) -> Self {
        events.sort_by_key(|e| e.time);
        events.shrink_to_fit();
        Self { tpb, events }
    }

    pub fn tpb(&self) -> TicksPerQuarter {
        self.tpb
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// The time of the last event, i.e. the tick at which playback of the
    /// final event begins.
    pub fn duration_ticks(&self) -> u32 {
        self.events.last().map(|e| e.time).unwrap_or(0)
    }
}
