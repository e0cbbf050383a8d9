use std::fmt;

/// Error taxonomy shared by every codec parser and the DSI builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Reader drained mid-NAL or before first sync. Normal terminator.
    EndOfStream,
    /// Bit pattern violates the codec spec (forbidden zero bit, reserved
    /// value, impossible id, or a structural bound was exceeded).
    SyntaxError(String),
    /// Valid spec but outside this parser's scope.
    NotSupported(String),
    /// Parameter-set collision while the caller set a single-SD policy.
    MultiSdForbidden,
    /// Scratch allocation failure.
    NoMemory,
    /// Video/audio payload encountered before its parameter sets.
    NoConfig,
    /// Postcondition violation; indicates a bug in this crate.
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EndOfStream => write!(f, "end of stream"),
            Error::SyntaxError(s) => write!(f, "syntax error: {s}"),
            Error::NotSupported(s) => write!(f, "not supported: {s}"),
            Error::MultiSdForbidden => write!(f, "parameter-set collision forbidden by single-SD policy"),
            Error::NoMemory => write!(f, "scratch allocation failure"),
            Error::NoConfig => write!(f, "payload encountered before its parameter sets"),
            Error::Internal(s) => write!(f, "internal error: {s}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
