use std::error;
use std::fmt;
use std::io;

/// The error type used by swf-tags.
#[derive(Debug)]
pub enum Error {
    /// Any IO error, either from directly reading files or from other libraries.
    IoError(io::Error),
    /// All-encompassing variant for anything that can't be a swf file.
    NotSwf,
    /// A loader asked for more bytes than the current tag has left.
    PrematureEnd {
        /// How many bytes (or bits, for bit field reads) were requested.
        needed: usize,
        /// How many were left before the end of the tag.
        left: usize,
    },
    /// The underlying buffer ran out before the tag said it would.
    EndOfStream,
    /// Structural corruption that makes the rest of the current structure
    /// unreadable, such as a glyph offset pointing outside its tag.
    Corrupted(String),
}

/// Shorthand for results carrying the crate error.
pub type Result<T> = ::std::result::Result<T, Error>;

impl Error {
    pub(crate) fn corrupted<S: Into<String>>(msg: S) -> Self {
        Error::Corrupted(msg.into())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::NotSwf,
            _ => Error::IoError(err),
        }
    }
}

impl From<lzma_rs::error::Error> for Error {
    fn from(err: lzma_rs::error::Error) -> Self {
        use lzma_rs::error::Error::*;
        match err {
            IoError(error) => error.into(),
            _ => Error::NotSwf,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => write!(f, "io error: {}", err),
            Error::NotSwf => write!(f, "not a swf file"),
            Error::PrematureEnd { needed, left } => write!(
                f,
                "premature end of tag: need to read {} bytes, but only {} left in this tag",
                needed, left
            ),
            Error::EndOfStream => write!(f, "unexpected end of stream while reading"),
            Error::Corrupted(ref msg) => write!(f, "{}", msg),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}
