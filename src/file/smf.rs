use crate::byte_iter::ByteIter;
use crate::core::{kind, Event, Sequence, TicksPerQuarter, TimedEvent};
use crate::error::{FileKind, LibResult, Result};
use log::{debug, trace, warn};
use snafu::ResultExt;
use std::io::Read;
use std::path::Path;

// https://www.music.mcgill.ca/~gary/306/week9/smf.html

/// Parse a Standard MIDI File from a reader into a [`Sequence`].
///
/// Tracks are merged: every event is stamped with its absolute tick and the
/// result is sorted by time, stable with respect to the original intra-track
/// order. Only channel events and Set Tempo survive; other meta events and
/// SysEx are dropped here.
pub fn read_sequence<R: Read>(r: R) -> Result<Sequence> {
    let iter = ByteIter::new(r.bytes()).context(io!())?;
    Ok(read_inner(iter)?)
}

/// Parse a Standard MIDI File on disk into a [`Sequence`].
pub fn load_sequence<P: AsRef<Path>>(path: P) -> Result<Sequence> {
    Ok(read_inner(ByteIter::new_file(path).context(io!())?)?)
}

fn read_inner<R: Read>(mut iter: ByteIter<R>) -> LibResult<Sequence> {
    trace!("parsing header chunk");
    iter.expect_tag("MThd").context(io!())?;
    let chunk_length = iter.read_u32().context(io!())?;
    // the header chunk is 6 bytes in every known file, but the length field
    // exists so that it can grow; skip whatever we do not understand
    let format = iter.read_u16().context(io!())?;
    let n_tracks = iter.read_u16().context(io!())?;
    let division = iter.read_u16().context(io!())?;
    if division & 0x8000 != 0 {
        unsupported!("SMPTE time division");
    }
    if division == 0 {
        invalid_data!(FileKind::Smf, "time division of zero");
    }
    if chunk_length > 6 {
        iter.skip(chunk_length as u64 - 6).context(io!())?;
    }
    debug!(
        "format {}, {} tracks, {} ticks per quarter note",
        format, n_tracks, division
    );
    // format 0/1/2 makes no difference once the tracks are merged
    let mut events = Vec::new();
    for i in 0..n_tracks {
        trace!("parsing track chunk {} (zero-based) of {}", i, n_tracks);
        read_track(&mut iter, &mut events)?;
    }
    if !iter.is_end() {
        warn!(
            "{} is followed by extra bytes after the last track, ignoring them",
            iter.position()
        );
    }
    Ok(Sequence::new(TicksPerQuarter::new(division), events))
}

fn read_track<R: Read>(iter: &mut ByteIter<R>, events: &mut Vec<TimedEvent>) -> LibResult<()> {
    iter.expect_tag("MTrk").context(io!())?;
    let chunk_length = iter.read_u32().context(io!())?;
    iter.set_size_limit(chunk_length as u64);
    let mut time: u32 = 0;
    // the value does not matter as long as it is a status byte; a file that
    // relies on running status before sending any status byte is broken
    let mut status: u8 = 0x80;
    while !iter.is_end() {
        let delta = iter.read_vlq_u32().context(io!())?;
        time = time.wrapping_add(delta);
        let byte = iter.peek_or_die().context(io!())?;
        let (k, channel) = if byte & 0x80 != 0 {
            iter.read_or_die().context(io!())?;
            status = byte;
            (byte >> 4, byte & 0x0F)
        } else {
            (status >> 4, status & 0x0F)
        };
        if k == kind::COMMON {
            if channel == 0x0F {
                // meta event; only Set Tempo is kept
                let meta_type = iter.read_or_die().context(io!())?;
                let length = iter.read_vlq_u32().context(io!())?;
                if meta_type == 0x51 {
                    if length != 3 {
                        invalid_data!(
                            FileKind::Smf,
                            "tempo event of length {} instead of 3",
                            length
                        );
                    }
                    let payload = iter.read_n(3).context(io!())?;
                    trace!("set tempo at tick {}", time);
                    events.push(TimedEvent {
                        time,
                        event: Event {
                            kind: kind::SET_TEMPO,
                            channel: payload[0],
                            param1: payload[1],
                            param2: payload[2],
                        },
                    });
                } else {
                    trace!("dropping meta event {:#04x} of length {}", meta_type, length);
                    iter.skip(length as u64).context(io!())?;
                }
            } else {
                // SysEx (F0/F7): length-prefixed body, skipped
                let length = iter.read_vlq_u32().context(io!())?;
                trace!("dropping sysex of length {}", length);
                iter.skip(length as u64).context(io!())?;
            }
        } else {
            let param1 = iter.read_or_die().context(io!())?;
            let param2 = if Event::data_bytes(k) == 2 {
                iter.read_or_die().context(io!())?
            } else {
                0
            };
            events.push(TimedEvent {
                time,
                event: Event {
                    kind: k,
                    channel,
                    param1,
                    param2,
                },
            });
        }
    }
    iter.clear_size_limit();
    Ok(())
}
