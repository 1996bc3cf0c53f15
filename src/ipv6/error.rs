use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum Error {
    InvalidVersion,
    InvalidTotalLen,
    TruncatedExtensionChain,
    UnrecognizedNextHeader { value: u8, pointer: u32 },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidVersion => write!(f, "invalid version"),
            Error::InvalidTotalLen => write!(f, "invalid total length"),
            Error::TruncatedExtensionChain => write!(f, "truncated extension chain"),
            Error::UnrecognizedNextHeader { value, pointer } => {
                write!(f, "unrecognized next header {} at offset {}", value, pointer)
            }
        }
    }
}

impl std::error::Error for Error {}
