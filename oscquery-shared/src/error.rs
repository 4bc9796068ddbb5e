#![allow(dead_code)]

use std::io;
use std::num::{ParseFloatError, ParseIntError};
use std::string::FromUtf8Error;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    //DNS message errors
    #[error("insufficient data for base length type")]
    ErrBaseLen,
    #[error("insufficient data for calculated length type")]
    ErrCalcLen,
    #[error("segment prefix is reserved")]
    ErrReserved,
    #[error("too many pointers (>10)")]
    ErrTooManyPtr,
    #[error("invalid pointer")]
    ErrInvalidPtr,
    #[error("nil resource body")]
    ErrNilResourceBody,
    #[error("insufficient data for resource body length")]
    ErrResourceLen,
    #[error("segment length too long")]
    ErrSegTooLong,
    #[error("zero length segment")]
    ErrZeroSegLen,
    #[error("resource length too long")]
    ErrResTooLong,
    #[error("too many Questions to pack (>65535)")]
    ErrTooManyQuestions,
    #[error("too many Answers to pack (>65535)")]
    ErrTooManyAnswers,
    #[error("too many Authorities to pack (>65535)")]
    ErrTooManyAuthorities,
    #[error("too many Additionals to pack (>65535)")]
    ErrTooManyAdditionals,
    #[error("name is not in canonical format (it must end with a .)")]
    ErrNonCanonicalName,
    #[error("character string exceeds maximum length (255)")]
    ErrStringTooLong,
    #[error("parsing/packing of this type isn't available yet")]
    ErrNotStarted,
    #[error("parsing/packing of this section has completed")]
    ErrSectionDone,
    #[error("label contains a '.' and cannot be encoded: {0}")]
    ErrLabelContainsDot(String),

    //Engine errors
    /// ErrConnectionClosed indicates an operation executed after the engine
    /// or service was closed.
    #[error("connection closed")]
    ErrConnectionClosed,
    #[error("SRV record not found in message")]
    ErrSrvRecordNotFound,
    #[error("no A record address found for {0}")]
    ErrNoAddressRecord(String),
    #[error("unexpected service type: {0}")]
    ErrUnknownServiceType(String),

    //Parameter tree errors
    #[error("invalid OSC path, must start with '/': {0}")]
    ErrInvalidPath(String),
    #[error("OSC path already exists: {0}")]
    ErrPathExists(String),
    #[error("OSC path not found: {0}")]
    ErrPathNotFound(String),
    #[error("unsupported OSC type: {0}")]
    ErrUnsupportedType(String),
    #[error("invalid value {value:?} for OSC type '{tag}'")]
    ErrInvalidValue { value: String, tag: char },

    //HTTP errors
    #[error("http status: {0}")]
    ErrHttpStatus(u16),
    #[error("http server already started")]
    ErrHttpServerStarted,
    #[error("http: {0}")]
    Http(String),
    #[error("mutex poison: {0}")]
    PoisonError(String),

    //Third Party Error
    #[error("parse int: {0}")]
    ParseInt(#[from] ParseIntError),
    #[error("parse float: {0}")]
    ParseFloat(#[from] ParseFloatError),
    #[error("{0}")]
    Io(#[source] IoError),
    #[error("utf8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("json: {0}")]
    Json(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::PoisonError(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_io_error_compares_by_kind() {
        let a: Error = io::Error::new(io::ErrorKind::AddrInUse, "first").into();
        let b: Error = io::Error::new(io::ErrorKind::AddrInUse, "second").into();
        let c: Error = io::Error::other("third").into();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
