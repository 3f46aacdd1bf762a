use std::array::TryFromSliceError;
use std::string::FromUtf8Error;

#[derive(Debug)]
pub enum Error {
    /// Fewer than 20 bytes were available; the caller should wait for more
    /// bytes to arrive before retrying.
    Incomplete,
    /// The header declared a version other than 1.
    UnsupportedVersion(u8),
    /// The header's 24-bit length field disagreed with what was decoded.
    LengthMismatch { declared: u32, actual: u32 },
    /// An AVP's length field ran past the end of the message.
    TruncatedAvp,
    /// An AVP was requested by code but is not present, or present but not
    /// shaped the way the accessor expected.
    MissingAvp(u32),
    Utf8Error(FromUtf8Error),
    TryFromSliceError(TryFromSliceError),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incomplete => write!(f, "incomplete diameter message"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported diameter version: {v}"),
            Self::LengthMismatch { declared, actual } => write!(
                f,
                "header length {declared} does not match decoded length {actual}"
            ),
            Self::TruncatedAvp => write!(f, "truncated AVP"),
            Self::MissingAvp(code) => write!(f, "missing or malformed AVP {code}"),
            Self::Utf8Error(e) => write!(f, "{e}"),
            Self::TryFromSliceError(e) => write!(f, "{e}"),
        }
    }
}

impl From<FromUtf8Error> for Error {
    fn from(value: FromUtf8Error) -> Self {
        Self::Utf8Error(value)
    }
}

impl From<TryFromSliceError> for Error {
    fn from(value: TryFromSliceError) -> Self {
        Self::TryFromSliceError(value)
    }
}
