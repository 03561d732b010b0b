use std::io;

/// Transport-level failure. Everything recoverable at the protocol level is
/// reported through return values on the components themselves; this only
/// covers the socket layer.
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
}

impl From<io::Error> for Error {
    fn from(io_error: io::Error) -> Self {
        Error::Io(io_error)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
