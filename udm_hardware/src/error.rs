use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("echo line did not return low before timeout")]
    EchoIdleTimeout,
    #[error("digit index {0} out of range")]
    InvalidDigit(usize),
    #[error("storage access out of bounds: {addr}+{len} exceeds {capacity} bytes")]
    OutOfBounds {
        addr: usize,
        len: usize,
        capacity: usize,
    },
    #[error("erase address {0:#x} is not page aligned")]
    Misaligned(usize),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
