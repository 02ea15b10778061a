mod utils;

use patchsynth::core::Bank;
use patchsynth::file;
use std::fs;
use tempfile::tempdir;
use utils::{enable_logging, patch_bytes, SampleSpec};

fn write_patch(dir: &std::path::Path, stem: &str, volume: u16) {
    fs::write(
        dir.join(format!("{}.pat", stem)),
        patch_bytes(volume, &[SampleSpec::default()]),
    )
    .unwrap();
}

#[test]
fn loads_assignments_and_options() {
    enable_logging();
    let dir = tempdir().unwrap();
    write_patch(dir.path(), "piano", 100);
    write_patch(dir.path(), "organ", 80);
    write_patch(dir.path(), "kick", 60);
    let cfg = dir.path().join("default.cfg");
    fs::write(
        &cfg,
        "\
# a bank description
bank 0
0 piano amp=150 note=60
1 organ keep=loop keep=env mystery=ignored

drumset 0
35 kick amp = 50   # spaces around '=' are fine
",
    )
    .unwrap();
    let mut bank = Bank::new();
    file::load_config(&mut bank, &cfg).unwrap();

    let piano = bank.patch(0).unwrap();
    assert_eq!(150, piano.volume); // 100 * 150%
    assert_eq!(60, piano.note);
    assert!(!piano.keep_loop);

    let organ = bank.patch(1).unwrap();
    assert_eq!(80, organ.volume);
    assert!(organ.keep_loop);
    assert!(organ.keep_envelope);
    assert_eq!(-1, organ.note);

    let kick = bank.drum(35).unwrap();
    assert_eq!(30, kick.volume); // 60 * 50%
    assert!(bank.patch(35).is_none());
    assert!(bank.drum(0).is_none());
}

#[test]
fn higher_banks_are_skipped() {
    enable_logging();
    let dir = tempdir().unwrap();
    write_patch(dir.path(), "piano", 100);
    let cfg = dir.path().join("banks.cfg");
    // the bank 2 line names a file that does not exist; it must not load
    fs::write(
        &cfg,
        "\
bank 2
5 missing amp=50
bank 0
5 piano
",
    )
    .unwrap();
    let mut bank = Bank::new();
    file::load_config(&mut bank, &cfg).unwrap();
    assert_eq!(100, bank.patch(5).unwrap().volume);
}

#[test]
fn second_assignment_replaces_the_first() {
    enable_logging();
    let dir = tempdir().unwrap();
    write_patch(dir.path(), "first", 10);
    write_patch(dir.path(), "second", 20);
    let cfg = dir.path().join("replace.cfg");
    fs::write(&cfg, "bank 0\n7 first\n7 second\n").unwrap();
    let mut bank = Bank::new();
    file::load_config(&mut bank, &cfg).unwrap();
    assert_eq!(20, bank.patch(7).unwrap().volume);
}

#[test]
fn errors_leave_the_bank_untouched() {
    enable_logging();
    let dir = tempdir().unwrap();
    write_patch(dir.path(), "piano", 100);
    let cfg = dir.path().join("broken.cfg");
    // the first assignment would load, the second names a missing file
    fs::write(&cfg, "bank 0\n0 piano\n1 missing\n").unwrap();
    let mut bank = Bank::new();
    assert!(file::load_config(&mut bank, &cfg).is_err());
    assert!(bank.patch(0).is_none());
}

#[test]
fn bad_directives_are_rejected() {
    enable_logging();
    let dir = tempdir().unwrap();
    let mut bank = Bank::new();

    let cfg = dir.path().join("bad1.cfg");
    fs::write(&cfg, "flub 3\n").unwrap();
    let err = file::load_config(&mut bank, &cfg).unwrap_err();
    assert!(format!("{}", err).contains("flub"));

    let cfg = dir.path().join("bad2.cfg");
    fs::write(&cfg, "200 piano\n").unwrap();
    let err = file::load_config(&mut bank, &cfg).unwrap_err();
    assert!(format!("{}", err).contains("program"));

    let cfg = dir.path().join("bad3.cfg");
    write_patch(dir.path(), "piano", 100);
    fs::write(&cfg, "0 piano amp\n").unwrap();
    let err = file::load_config(&mut bank, &cfg).unwrap_err();
    assert!(format!("{}", err).contains("'='"));

    let cfg = dir.path().join("bad4.cfg");
    fs::write(&cfg, "! what\n").unwrap();
    assert!(file::load_config(&mut bank, &cfg).is_err());

    let missing = dir.path().join("nonexistent.cfg");
    assert!(file::load_config(&mut bank, &missing).is_err());
}

#[test]
fn patch_files_load_from_disk() {
    enable_logging();
    let dir = tempdir().unwrap();
    write_patch(dir.path(), "inst", 90);
    let patch = file::load_patch(dir.path().join("inst.pat")).unwrap();
    assert_eq!(90, patch.volume);
    assert_eq!(1, patch.samples.len());
    assert!(file::load_patch(dir.path().join("void.pat")).is_err());
}
