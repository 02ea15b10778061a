use snafu::Snafu;
use std::path::PathBuf;

/// The public Error type for this library.
#[derive(Debug, Snafu)]
pub struct Error(LibError);

/// The public Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// The internal Result type for this library.
pub(crate) type LibResult<T> = std::result::Result<T, LibError>;

/// The kind of input file an error refers to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FileKind {
    /// A Standard MIDI File.
    Smf,
    /// A GF1 PATCH instrument file.
    Gf1Patch,
    /// A bank description (`.cfg`) file.
    Config,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::Smf => write!(f, "MIDI file"),
            FileKind::Gf1Patch => write!(f, "GF1 patch"),
            FileKind::Config => write!(f, "config"),
        }
    }
}

/// The internal Error type for this library.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum LibError {
    #[snafu(display("Error while reading bytes: {}", source))]
    Io {
        site: String,
        source: crate::byte_iter::ByteError,
    },

    #[snafu(display("{}: The {} data is invalid: {}", site, kind, description))]
    InvalidData {
        site: String,
        kind: crate::error::FileKind,
        description: String,
    },

    #[snafu(display("{}: unsupported feature: {}", site, what))]
    Unsupported { site: String, what: String },

    #[snafu(display("unable to open '{}': {}", path.display(), source))]
    FileOpen {
        site: String,
        path: PathBuf,
        source: std::io::Error,
    },
}

macro_rules! site {
    () => {
        format!("{}:{}", file!(), line!())
    };
}

macro_rules! io {
    () => {
        crate::error::IoSnafu { site: site!() }
    };
}

macro_rules! invalid_data_s {
    ($kind:expr, $msg:expr) => {
        crate::error::InvalidDataSnafu {
            site: site!(),
            kind: $kind,
            description: $msg,
        }
    };
    ($kind:expr, $fmt:expr, $($arg:expr),+) => {
        crate::error::InvalidDataSnafu {
            site: site!(),
            kind: $kind,
            description: format!($fmt, $($arg),+),
        }
    };
}

macro_rules! invalid_data_e {
    ($kind:expr, $msg:expr) => {
        invalid_data_s!($kind, $msg).build()
    };
    ($kind:expr, $fmt:expr, $($arg:expr),+) => {
        invalid_data_s!($kind, $fmt, $($arg),+).build()
    };
}

macro_rules! invalid_data_r {
    ($kind:expr, $msg:expr) => {
        Err(invalid_data_e!($kind, $msg))
    };
    ($kind:expr, $fmt:expr, $($arg:expr),+) => {
        Err(invalid_data_e!($kind, $fmt, $($arg),+))
    };
}

macro_rules! invalid_data {
    ($kind:expr, $msg:expr) => {
        return invalid_data_r!($kind, $msg)
    };
    ($kind:expr, $fmt:expr, $($arg:expr),+) => {
        return invalid_data_r!($kind, $fmt, $($arg),+)
    };
}

macro_rules! unsupported {
    ($what:expr) => {
        return crate::error::UnsupportedSnafu {
            site: site!(),
            what: String::from($what),
        }
        .fail()
    };
}

#[test]
fn site_test() {
    let line = line!() + 1;
    let site = site!();
    assert!(site.contains("error.rs"));
    assert!(site.contains(format!("{}", line).as_str()));
}

#[test]
fn invalid_data_macros_test_message() {
    fn foo() -> LibResult<u64> {
        invalid_data!(crate::error::FileKind::Smf, "flerbin");
    }
    let result = foo();
    assert!(result.is_err());
    let message = format!("{}", result.err().unwrap());
    assert!(message.as_str().contains("flerbin"));
    assert!(message.as_str().contains("MIDI file"));
}

#[test]
fn invalid_data_macros_test_fmt() {
    fn foo() -> LibResult<u64> {
        invalid_data!(
            crate::error::FileKind::Config,
            "hello {}, {}",
            "world",
            String::from("foo")
        );
    }
    let result = foo();
    assert!(result.is_err());
    let message = format!("{}", result.err().unwrap());
    assert!(message.as_str().contains("hello world, foo"));
}

#[test]
fn unsupported_macro_test() {
    fn foo() -> LibResult<u64> {
        unsupported!("SMPTE time division");
    }
    let result = foo();
    assert!(result.is_err());
    let message = format!("{}", result.err().unwrap());
    assert!(message.as_str().contains("SMPTE"));
}
