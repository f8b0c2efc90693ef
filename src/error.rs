use std::fmt;

use thiserror::Error;

use crate::codec::CodecError;
use crate::convert::ConvertError;
use crate::data::StoreError;
use crate::data::parser_utils::ParseError;
use crate::merge::MergeError;
use crate::pipeline::PipelineError;

/// Single error type for callers that do not care which stage failed.
#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
}

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("Parse error: {detail}")]
    ParseError { detail: String },
    #[error("Record layout error: {0}")]
    Layout(#[from] ParseError),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),
    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[cfg(feature = "json")]
    #[error("Error serializing or deserializing json: {err}")]
    SerdeJson {
        #[from]
        err: serde_json::Error,
    },
    #[error("IO error")]
    IoError(#[from] std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl From<winnow::error::ErrMode<winnow::error::ContextError>> for Error {
    fn from(e: winnow::error::ErrMode<winnow::error::ContextError>) -> Self {
        Self {
            kind: ErrorKind::ParseError {
                detail: format!("{e}"),
            },
        }
    }
}

impl From<winnow::error::ErrMode<winnow::error::ContextError>> for ErrorKind {
    fn from(e: winnow::error::ErrMode<winnow::error::ContextError>) -> Self {
        ErrorKind::ParseError {
            detail: format!("{e}"),
        }
    }
}

macro_rules! error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl std::convert::From<$ty> for Error {
                fn from(x: $ty) -> Error {
                    Error { kind: x.into() }
                }
            }
        )*
    };
}

error_from!(
    ParseError,
    CodecError,
    StoreError,
    MergeError,
    ConvertError,
    PipelineError,
    std::io::Error,
);

#[cfg(feature = "json")]
impl std::convert::From<serde_json::Error> for Error {
    fn from(x: serde_json::Error) -> Error {
        Error { kind: x.into() }
    }
}

pub type IResult<T> = Result<T, Error>;

pub fn failure_from_kind(kind: ErrorKind) -> Error {
    Error { kind }
}
