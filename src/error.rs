use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(i32)]
pub enum Rav1dError {
    /// A picture, plane or parameter does not satisfy the grain synthesis
    /// preconditions.
    EINVAL = 22,
    /// A value is outside the range the bitstream syntax allows.
    ERANGE = 34,
}

impl Display for Rav1dError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::EINVAL => write!(f, "invalid argument"),
            Self::ERANGE => write!(f, "value out of range"),
        }
    }
}

impl Error for Rav1dError {}

pub type Rav1dResult<T = ()> = Result<T, Rav1dError>;
