use crate::vlq::{decode_slice, VlqError, CONTINUE};
use log::trace;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::fs::File;
use std::io::{BufReader, Bytes, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::str::{from_utf8, Utf8Error};

/// A byte-at-a-time reader that tracks its absolute position, supports a
/// single byte of lookahead, and can be limited to a chunk of known size.
/// Multi-byte integers can be read in either endianness: Standard MIDI Files
/// are big-endian while GF1 patch files are little-endian.
pub(crate) struct ByteIter<R: Read> {
    iter: Bytes<R>,
    /// The number of bytes consumed so far.
    position: u64,
    peek: Option<u8>,
    position_limit: Option<u64>,
}

#[derive(Debug, Snafu)]
pub(crate) enum ByteError {
    #[snafu(display("io error around byte {}: {}", position, source))]
    Io {
        position: u64,
        source: std::io::Error,
    },

    #[snafu(display("unexpected end reached around byte {}", position))]
    End { position: u64 },

    #[snafu(display(
        "expected string but found non-utf8 encoded bytes around {}: {}",
        position,
        source
    ))]
    Str { position: u64, source: Utf8Error },

    #[snafu(display(
        "expected tag '{}' but found '{}' near position {}",
        expected,
        found,
        position
    ))]
    Tag {
        expected: String,
        found: String,
        position: u64,
    },

    #[snafu(display("too many bytes while reading vlq around {}", position))]
    VlqTooBig { position: u64 },

    #[snafu(display("problem decoding vlq around {}: {}", position, source))]
    VlqDecode { position: u64, source: VlqError },

    #[snafu(display(
        "incorrect byte value around {}: expected '{:#X}', found '{:#X}'",
        position,
        expected,
        found,
    ))]
    ReadExpect {
        expected: u8,
        found: u8,
        position: u64,
    },

    #[snafu(display("unable to open '{}': {}", path.display(), source,))]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub(crate) type ByteResult<T> = std::result::Result<T, ByteError>;

const BUF_CAPACITY: usize = 1024 * 1024;

impl ByteIter<BufReader<File>> {
    pub(crate) fn new_file<P: AsRef<Path>>(path: P) -> ByteResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).context(FileOpenSnafu { path })?;
        let buf = BufReader::with_capacity(BUF_CAPACITY, f);
        Self::new(buf.bytes())
    }
}

impl<R: Read> ByteIter<R> {
    pub(crate) fn new(mut iter: Bytes<R>) -> ByteResult<Self> {
        let peek = Self::next_impl(&mut iter, 0)?;
        Ok(Self {
            iter,
            position: 0,
            peek,
            position_limit: None,
        })
    }

    fn next_impl(iter: &mut Bytes<R>, position: u64) -> ByteResult<Option<u8>> {
        match iter.next() {
            None => Ok(None),
            Some(result) => match result {
                Ok(val) => Ok(Some(val)),
                Err(ref e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
                Err(e) => Err(e).context(IoSnafu { position }),
            },
        }
    }

    /// Read a single byte and advance. Returns `None` at the end of the
    /// underlying data or when the size limit has been reached.
    pub(crate) fn read(&mut self) -> ByteResult<Option<u8>> {
        if let Some(limit) = self.position_limit {
            if self.position >= limit {
                return Ok(None);
            }
        }
        let return_val = self.peek;
        if return_val.is_some() {
            self.position += 1;
            self.peek = Self::next_impl(&mut self.iter, self.position)?;
            trace!(
                "read {:#x} at position {}",
                return_val.unwrap_or(0),
                self.position - 1
            );
        }
        Ok(return_val)
    }

    pub(crate) fn read_or_die(&mut self) -> ByteResult<u8> {
        self.read()?.context(EndSnafu {
            position: self.position,
        })
    }

    /// Get the next value without advancing.
    pub(crate) fn peek(&self) -> Option<u8> {
        if let Some(limit) = self.position_limit {
            if self.position >= limit {
                return None;
            }
        }
        self.peek
    }

    pub(crate) fn peek_or_die(&self) -> ByteResult<u8> {
        self.peek().context(EndSnafu {
            position: self.position,
        })
    }

    pub(crate) fn read2(&mut self) -> ByteResult<[u8; 2]> {
        Ok([self.read_or_die()?, self.read_or_die()?])
    }

    pub(crate) fn read4(&mut self) -> ByteResult<[u8; 4]> {
        Ok([
            self.read_or_die()?,
            self.read_or_die()?,
            self.read_or_die()?,
            self.read_or_die()?,
        ])
    }

    pub(crate) fn read_u16(&mut self) -> ByteResult<u16> {
        Ok(u16::from_be_bytes(self.read2()?))
    }

    pub(crate) fn read_u32(&mut self) -> ByteResult<u32> {
        Ok(u32::from_be_bytes(self.read4()?))
    }

    pub(crate) fn read_u16_le(&mut self) -> ByteResult<u16> {
        Ok(u16::from_le_bytes(self.read2()?))
    }

    pub(crate) fn read_u32_le(&mut self) -> ByteResult<u32> {
        Ok(u32::from_le_bytes(self.read4()?))
    }

    pub(crate) fn read_vlq_u32(&mut self) -> ByteResult<u32> {
        let mut bytes = Vec::new();
        let mut current_byte = CONTINUE;
        while current_byte & CONTINUE == CONTINUE {
            ensure!(
                bytes.len() < 4,
                VlqTooBigSnafu {
                    position: self.position
                }
            );
            current_byte = self.read_or_die()?;
            bytes.push(current_byte);
        }
        let decoded = decode_slice(&bytes).context(VlqDecodeSnafu {
            position: self.position,
        })?;
        trace!("decoded vlq value {} from {} bytes", decoded, bytes.len());
        Ok(decoded)
    }

    pub(crate) fn is_end(&self) -> bool {
        self.peek().is_none()
    }

    /// The number of bytes consumed so far.
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn expect_tag(&mut self, expected_tag: &str) -> ByteResult<()> {
        let position = self.position;
        let tag_bytes = self.read4()?;
        let actual_tag = from_utf8(&tag_bytes).context(StrSnafu { position })?;
        ensure!(
            expected_tag == actual_tag,
            TagSnafu {
                expected: expected_tag,
                found: actual_tag,
                position,
            }
        );
        Ok(())
    }

    /// Consume `expected.len()` bytes and check each against `expected`.
    pub(crate) fn expect_bytes(&mut self, expected: &[u8]) -> ByteResult<()> {
        for &expected_byte in expected {
            self.read_expect(expected_byte)?;
        }
        Ok(())
    }

    pub(crate) fn read_expect(&mut self, expected: u8) -> ByteResult<()> {
        let position = self.position;
        let found = self.read_or_die()?;
        ensure!(
            expected == found,
            ReadExpectSnafu {
                expected,
                found,
                position,
            }
        );
        Ok(())
    }

    pub(crate) fn read_n(&mut self, num_bytes: usize) -> ByteResult<Vec<u8>> {
        let mut bytes = Vec::with_capacity(num_bytes);
        for _ in 0..num_bytes {
            bytes.push(self.read_or_die()?)
        }
        Ok(bytes)
    }

    pub(crate) fn skip(&mut self, num_bytes: u64) -> ByteResult<()> {
        for _ in 0..num_bytes {
            self.read_or_die()?;
        }
        Ok(())
    }

    /// When this is set, the iter will report that it is at the end once
    /// `size` more bytes have been read.
    pub(crate) fn set_size_limit(&mut self, size: u64) {
        self.position_limit = Some(self.position + size)
    }

    pub(crate) fn clear_size_limit(&mut self) {
        self.position_limit = None
    }
}
