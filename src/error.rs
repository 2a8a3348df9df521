//! Error taxonomy for the small, user-visible failure surface of the core.
//!
//! Per the error handling design, essentially everything the core encounters
//! after a ROM has loaded successfully is recovered locally (clamped bank
//! indices, open-bus reads, logged-and-ignored unofficial opcodes). The only
//! operation that can fail outright is [`crate::console::Console::load_rom`].

use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Provided buffer is shorter than the 16-byte iNES header.
    TooShort { actual: usize },
    /// Magic number (`"NES\x1A"`) is missing.
    InvalidMagic,
    /// A ROM section (trainer/PRG/CHR) is shorter than the header advertises.
    SectionTooShort {
        section: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Save-state document version is newer than this build understands.
    UnsupportedSaveStateVersion { found: u32, supported: u32 },
    /// Encoding/decoding the save-state document failed (requires the
    /// `savestate-postcard` feature; without it, save/load are unavailable).
    SaveStateCodec(String),
    /// Wrapper for I/O errors raised while reading ROMs from disk.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { actual } => {
                write!(f, "header expected 16 bytes, got {actual}")
            }
            Self::InvalidMagic => write!(f, "missing NES magic bytes"),
            Self::SectionTooShort {
                section,
                expected,
                actual,
            } => write!(
                f,
                "{section} section expected {expected} bytes, got {actual}"
            ),
            Self::UnsupportedSaveStateVersion { found, supported } => write!(
                f,
                "save state version {found} is newer than supported version {supported}"
            ),
            Self::SaveStateCodec(msg) => write!(f, "save state codec error: {msg}"),
            Self::Io(err) => write!(f, "i/o error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_offending_values() {
        assert_eq!(
            Error::TooShort { actual: 4 }.to_string(),
            "header expected 16 bytes, got 4"
        );
        assert_eq!(Error::InvalidMagic.to_string(), "missing NES magic bytes");
        assert_eq!(
            Error::SectionTooShort { section: "PRG", expected: 16384, actual: 100 }.to_string(),
            "PRG section expected 16384 bytes, got 100"
        );
        assert_eq!(
            Error::UnsupportedSaveStateVersion { found: 2, supported: 1 }.to_string(),
            "save state version 2 is newer than supported version 1"
        );
    }

    #[test]
    fn io_errors_are_wrapped_and_keep_their_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.nes");
        let err: Error = io_err.into();
        assert!(std::error::Error::source(&err).is_some());
    }
}
