use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum Error {
    AllocationFailed,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::AllocationFailed => write!(f, "allocation failed"),
        }
    }
}

impl std::error::Error for Error {}
