use crate::core::{Bank, Patch};
use crate::error::{FileKind, LibResult, Result};
use log::{debug, warn};
use snafu::ResultExt;
use std::path::Path;
use std::rc::Rc;

/// Load a bank description file into `bank`.
///
/// The format is line-oriented ASCII with `#` comments. `bank N` and
/// `drumset N` switch the target table; numbered lines assign `<stem>.pat`
/// (resolved relative to the config file) to a program or drum-note slot,
/// optionally followed by `key=value` options. Only bank 0 is loaded;
/// assignments for higher banks parse but are skipped.
///
/// The bank is modified only if the whole file parses and every named patch
/// loads; on error it is left untouched.
pub fn load_config<P: AsRef<Path>>(bank: &mut Bank, path: P) -> Result<()> {
    Ok(load_inner(bank, path.as_ref())?)
}

pub(crate) fn load_inner(bank: &mut Bank, path: &Path) -> LibResult<()> {
    let text = std::fs::read_to_string(path).context(crate::error::FileOpenSnafu {
        site: site!(),
        path,
    })?;
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    // everything is staged so that a parse error cannot leave the bank
    // half-assigned
    let mut staged: Vec<(bool, u8, Patch)> = Vec::new();
    let mut target_bank: i64 = 0;
    let mut drumset = false;
    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.split('#').next().unwrap_or("");
        let b = line.as_bytes();
        let mut i = 0usize;
        skip_ws(b, &mut i);
        if i >= b.len() {
            continue;
        }
        if b[i].is_ascii_alphabetic() {
            let word = read_word(b, &mut i);
            match word {
                b"bank" => {
                    skip_ws(b, &mut i);
                    target_bank = read_number(b, &mut i, line_no)?;
                    drumset = false;
                }
                b"drumset" => {
                    skip_ws(b, &mut i);
                    target_bank = read_number(b, &mut i, line_no)?;
                    drumset = true;
                }
                _ => invalid_data!(
                    FileKind::Config,
                    "unrecognized directive '{}' on line {}",
                    String::from_utf8_lossy(word),
                    line_no
                ),
            }
            skip_ws(b, &mut i);
            if i < b.len() {
                invalid_data!(FileKind::Config, "trailing text on line {}", line_no);
            }
            if target_bank != 0 {
                debug!("assignments for bank {} will be skipped", target_bank);
            }
        } else if b[i].is_ascii_digit() {
            let program = read_number(b, &mut i, line_no)?;
            if !(0..=127).contains(&program) {
                invalid_data!(
                    FileKind::Config,
                    "invalid program number {} on line {}",
                    program,
                    line_no
                );
            }
            skip_ws(b, &mut i);
            let stem = read_word(b, &mut i);
            if stem.is_empty() {
                invalid_data!(FileKind::Config, "missing patch name on line {}", line_no);
            }
            if target_bank == 0 {
                let mut file_name = String::from_utf8_lossy(stem).into_owned();
                file_name.push_str(".pat");
                let mut patch = super::gf1::load_inner(dir.join(file_name))?;
                while let Some((option, value)) = read_option(b, &mut i, line_no)? {
                    apply_option(&mut patch, option, value, line_no);
                }
                staged.push((drumset, program as u8, patch));
            } else {
                // validate the option grammar but drop the assignment
                while read_option(b, &mut i, line_no)?.is_some() {}
                warn!(
                    "skipping bank {} assignment on line {}",
                    target_bank, line_no
                );
            }
        } else {
            invalid_data!(
                FileKind::Config,
                "unexpected character {:?} on line {}",
                b[i] as char,
                line_no
            );
        }
    }
    for (is_drum, program, patch) in staged {
        let patch = Some(Rc::new(patch));
        if is_drum {
            bank.set_drum(program, patch);
        } else {
            bank.set_patch(program, patch);
        }
    }
    Ok(())
}

/// Read the next `key=value` pair, tolerating spaces around the `=`.
/// Returns `None` at end of line.
fn read_option<'a>(
    b: &'a [u8],
    i: &mut usize,
    line_no: usize,
) -> LibResult<Option<(&'a [u8], &'a [u8])>> {
    skip_ws(b, i);
    if *i >= b.len() {
        return Ok(None);
    }
    let option = read_word(b, i);
    skip_ws(b, i);
    if *i >= b.len() || b[*i] != b'=' {
        invalid_data!(
            FileKind::Config,
            "expected '=' after '{}' on line {}",
            String::from_utf8_lossy(option),
            line_no
        );
    }
    *i += 1;
    skip_ws(b, i);
    let value = read_word(b, i);
    Ok(Some((option, value)))
}

fn apply_option(patch: &mut Patch, option: &[u8], value: &[u8], line_no: usize) {
    match option {
        b"amp" => {
            if let Some(percent) = parse_number(value) {
                patch.volume = (patch.volume as i64 * percent / 100).clamp(0, 0xFFFF) as u16;
            }
        }
        b"note" => {
            if let Some(note) = parse_number(value) {
                if (0..=127).contains(&note) {
                    patch.note = note as i8;
                }
            }
        }
        b"keep" => match value {
            b"loop" => patch.keep_loop = true,
            b"env" => patch.keep_envelope = true,
            _ => {}
        },
        _ => debug!(
            "ignoring unknown option '{}' on line {}",
            String::from_utf8_lossy(option),
            line_no
        ),
    }
}

fn skip_ws(b: &[u8], i: &mut usize) {
    while *i < b.len() && (b[*i] == b' ' || b[*i] == b'\t') {
        *i += 1;
    }
}

fn read_word<'a>(b: &'a [u8], i: &mut usize) -> &'a [u8] {
    let start = *i;
    while *i < b.len() && !b[*i].is_ascii_whitespace() && b[*i] != b'=' {
        *i += 1;
    }
    &b[start..*i]
}

fn read_number(b: &[u8], i: &mut usize, line_no: usize) -> LibResult<i64> {
    let start = *i;
    while *i < b.len() && b[*i].is_ascii_digit() {
        *i += 1;
    }
    if *i == start {
        invalid_data!(FileKind::Config, "expected a number on line {}", line_no);
    }
    let mut value: i64 = 0;
    for digit in &b[start..*i] {
        value = (value * 10 + (digit - b'0') as i64).min(i64::from(u32::MAX));
    }
    Ok(value)
}

fn parse_number(value: &[u8]) -> Option<i64> {
    std::str::from_utf8(value).ok()?.parse().ok()
}
