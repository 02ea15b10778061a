mod utils;

use patchsynth::core::{control, Event, Sequence, TicksPerQuarter, TimedEvent};
use patchsynth::{file, Player};
use utils::{enable_logging, patch_bytes, SampleSpec};

fn seq(tpb: u16, events: Vec<TimedEvent>) -> Sequence {
    Sequence::new(TicksPerQuarter::new(tpb), events)
}

fn at(time: u32, event: Event) -> TimedEvent {
    TimedEvent { time, event }
}

fn left_channel(buf: &[i16]) -> Vec<i16> {
    buf.iter().step_by(2).copied().collect()
}

fn rising_edges(left: &[i16]) -> usize {
    let mut count = 0;
    for i in 1..left.len() {
        if left[i - 1] <= 0 && left[i] > 0 {
            count += 1;
        }
    }
    count
}

fn first_nonzero(left: &[i16]) -> Option<usize> {
    left.iter().position(|&s| s != 0)
}

#[test]
fn no_sequence_renders_silence() {
    enable_logging();
    let mut player = Player::new();
    assert!(!player.currently_playing());
    let mut buf = [123i16; 4096];
    player.get_audio(&mut buf);
    assert!(buf.iter().all(|&s| s == 0));
}

#[test]
fn silence_after_end() {
    enable_logging();
    let mut player = Player::new();
    // a lone zero-velocity note-on is a note off: nothing ever sounds
    player.play_sequence(seq(480, vec![at(0, Event::note_on(0, 60, 0))]));
    assert!(player.currently_playing());
    let mut buf = vec![77i16; 9600]; // 4800 frames
    player.get_audio(&mut buf);
    assert!(buf.iter().all(|&s| s == 0));
    assert!(!player.currently_playing());
}

#[test]
fn square_wave_fallback_at_concert_pitch() {
    enable_logging();
    let mut player = Player::new();
    // empty bank: note 69 renders as a square wave near 440 Hz
    player.play_sequence(seq(
        480,
        vec![at(0, Event::note_on(0, 69, 100)), at(480, Event::note_off(0, 69))],
    ));
    let mut buf = vec![0i16; 60_000];
    player.get_audio(&mut buf);
    let left = left_channel(&buf);
    // ticks are 50 frames at the default tempo, so the note starts after
    // the first full tick
    assert!(left[..50].iter().all(|&s| s == 0));
    assert!(left[50] < 0);
    // half a period of 440 Hz is 54.5 frames
    let half_period = left[50..].iter().position(|&s| s > 0).unwrap();
    assert!(
        (54..=56).contains(&half_period),
        "half period {} frames",
        half_period
    );
    // note off lands on tick 480, one setup tick after 24000 frames
    let off = 50 + 480 * 50;
    assert!(left[off - 1] != 0);
    assert!(left[off..].iter().all(|&s| s == 0));
    assert!(!player.currently_playing());
}

#[test]
fn tempo_change_moves_the_timeline() {
    enable_logging();
    let onset = |tempo: u32| -> usize {
        let mut player = Player::new();
        player.play_sequence(seq(
            480,
            vec![
                at(0, Event::set_tempo(tempo)),
                at(480, Event::note_on(0, 69, 100)),
                at(960, Event::note_off(0, 69)),
            ],
        ));
        let mut buf = vec![0i16; 120_000];
        player.get_audio(&mut buf);
        first_nonzero(&left_channel(&buf)).expect("note never sounded")
    };
    let at_500k = onset(500_000);
    let at_250k = onset(250_000);
    // 500000 us/beat at 480 tpb is 50 frames per tick; the note fires half
    // a second in, one setup tick late
    assert!((24_000..24_101).contains(&at_500k), "onset {}", at_500k);
    // halving the beat length halves the timeline, setup tick excluded
    assert_eq!(at_500k - 50, 2 * (at_250k - 50));
}

#[test]
fn pitch_bend_range_doubles_frequency() {
    enable_logging();
    let patch = file::read_patch(
        patch_bytes(64, &[SampleSpec::square_cycle(480, 100_000)]).as_slice(),
    )
    .unwrap();

    let measure = |events: Vec<TimedEvent>| -> f64 {
        let mut player = Player::new();
        player.set_patch(0, 0, patch.clone());
        player.play_sequence(seq(480, events));
        let mut buf = vec![0i16; 96_000];
        player.get_audio(&mut buf);
        let left = left_channel(&buf);
        // skip the attack, then count cycles over the remaining 0.9 s
        let window = &left[4800..];
        rising_edges(window) as f64 * 48_000.0 / window.len() as f64
    };

    let plain = measure(vec![at(0, Event::note_on(0, 69, 100))]);
    assert!((435.0..=445.0).contains(&plain), "measured {} Hz", plain);

    let bent = measure(vec![
        at(0, Event::controller(0, control::RPN_MSB, 0)),
        at(0, Event::controller(0, control::RPN_LSB, 0)),
        at(0, Event::controller(0, control::DATA_ENTRY_MSB, 12)),
        at(0, Event::pitch_bend(0, 8191)),
        at(0, Event::note_on(0, 69, 100)),
    ]);
    let ratio = bent / plain;
    assert!(
        (1.97..=2.03).contains(&ratio),
        "{} Hz bent vs {} Hz plain",
        bent,
        plain
    );
}

#[test]
fn rendering_to_completion_stops_playing() {
    enable_logging();
    let patch = file::read_patch(
        patch_bytes(64, &[SampleSpec::square_cycle(480, 100_000)]).as_slice(),
    )
    .unwrap();
    let mut player = Player::new();
    player.set_patch(0, 0, patch);
    player.play_sequence(seq(
        240,
        vec![at(0, Event::note_on(0, 60, 100)), at(240, Event::note_off(0, 60))],
    ));
    let mut buf = vec![0i16; 9600];
    let mut guard = 0;
    while player.currently_playing() {
        player.get_audio(&mut buf);
        guard += 1;
        assert!(guard < 1000, "playback never finished");
    }
    // once done, output is silence again
    player.get_audio(&mut buf);
    assert!(buf.iter().all(|&s| s == 0));
}

#[test]
fn reset_then_replay_is_deterministic() {
    enable_logging();
    let patch_data = patch_bytes(64, &[SampleSpec::square_cycle(480, 100_000)]);
    let sequence = seq(
        480,
        vec![
            at(0, Event::note_on(0, 69, 100)),
            at(240, Event::note_on(0, 72, 90)),
            at(480, Event::note_off(0, 69)),
            at(960, Event::note_off(0, 72)),
        ],
    );

    let mut first = Player::new();
    first.set_patch(0, 0, file::read_patch(patch_data.as_slice()).unwrap());
    first.play_sequence(sequence.clone());
    let mut out_first = vec![0i16; 48_000];
    first.get_audio(&mut out_first);

    // same engine, reset and replayed
    first.reset();
    first.play_sequence(sequence.clone());
    let mut out_again = vec![0i16; 48_000];
    first.get_audio(&mut out_again);
    assert_eq!(out_first, out_again);

    // fresh engine with the same bank
    let mut second = Player::new();
    second.set_patch(0, 0, file::read_patch(patch_data.as_slice()).unwrap());
    second.play_sequence(sequence);
    let mut out_fresh = vec![0i16; 48_000];
    second.get_audio(&mut out_fresh);
    assert_eq!(out_first, out_fresh);
}

#[test]
fn equivalent_timelines_finish_together() {
    enable_logging();
    let frames_to_done = |tpb: u16, scale: u32| -> usize {
        let mut player = Player::new();
        player.play_sequence(seq(
            tpb,
            vec![
                at(0, Event::note_on(0, 69, 100)),
                at(250 * scale, Event::note_off(0, 69)),
            ],
        ));
        let mut frames = 0;
        let mut buf = [0i16; 96]; // 48 frames at a time
        while player.currently_playing() {
            player.get_audio(&mut buf);
            frames += 48;
            assert!(frames < 200_000, "never finished");
        }
        frames
    };
    // double the resolution, double the tick values: the same music
    let coarse = frames_to_done(250, 1);
    let fine = frames_to_done(500, 2);
    // the lead-in tick differs between resolutions, nothing else may
    assert!(
        coarse.abs_diff(fine) <= 96 + 48,
        "coarse {} vs fine {}",
        coarse,
        fine
    );
}

#[test]
fn byte_api_matches_sample_api() {
    enable_logging();
    let make = || {
        let mut player = Player::new();
        player.play_sequence(seq(
            480,
            vec![at(0, Event::note_on(3, 64, 101)), at(960, Event::note_off(3, 64))],
        ));
        player
    };
    let mut samples = vec![0i16; 4096];
    make().get_audio(&mut samples);
    let mut bytes = vec![0u8; 8192];
    make().get_audio_bytes(&mut bytes);
    for (i, &sample) in samples.iter().enumerate() {
        let le = i16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]);
        assert_eq!(sample, le, "sample {}", i);
    }
}

#[test]
fn fast_forward_skips_the_preamble() {
    enable_logging();
    let mut player = Player::new();
    player.play_sequence(seq(
        480,
        vec![
            at(0, Event::controller(0, control::VOLUME, 99)),
            at(0, Event::program_change(0, 7)),
            at(4800, Event::note_on(0, 69, 100)),
            at(5280, Event::note_off(0, 69)),
        ],
    ));
    player.fast_forward_to_note();
    let mut buf = vec![0i16; 2048];
    player.get_audio(&mut buf);
    let left = left_channel(&buf);
    let onset = first_nonzero(&left).expect("note should start almost immediately");
    // the 4800-tick wait is gone; only the collapsed tick budget remains
    assert!(onset <= 1, "onset {}", onset);
    // and the preamble still took effect
    let mut check = Player::new();
    check.play_sequence(seq(480, vec![at(0, Event::note_on(0, 69, 100))]));
    let mut unaffected = vec![0i16; 2048];
    check.get_audio(&mut unaffected);
    // volume 99 instead of 127 must change the square amplitude
    let quiet_peak = left.iter().map(|s| s.unsigned_abs()).max().unwrap();
    let loud_peak = left_channel(&unaffected)
        .iter()
        .map(|s| s.unsigned_abs())
        .max()
        .unwrap();
    assert!(quiet_peak < loud_peak, "{} vs {}", quiet_peak, loud_peak);
}
