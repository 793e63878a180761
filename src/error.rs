use std::{error, fmt, io};

use four_cc::FourCC;

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by fabric.
#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    ParameterError(String),
    ParameterNotFoundError(FourCC),
    BufferError(String),
    SendError(String),
    OutputError(Box<dyn error::Error + Send + Sync>),
    IoError(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParameterError(str) => write!(f, "Invalid parameter: {str}"),
            Self::ParameterNotFoundError(id) => write!(f, "Parameter with id '{id}' not found"),
            Self::BufferError(str) => write!(f, "Invalid source buffer: {str}"),
            Self::SendError(str) => write!(f, "Failed to send control message: {str}"),
            Self::OutputError(err) => err.fmt(f),
            Self::IoError(err) => err.fmt(f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            Error::ParameterError("density must be > 0".to_string()).to_string(),
            "Invalid parameter: density must be > 0"
        );
        assert_eq!(
            Error::ParameterNotFoundError(FourCC(*b"FXXX")).to_string(),
            "Parameter with id 'FXXX' not found"
        );
        let io_error = Error::from(io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert!(matches!(io_error, Error::IoError(_)));
        assert_eq!(io_error.to_string(), "missing");
    }
}
