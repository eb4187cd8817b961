use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("uart error: {0}")]
    Uart(String),
    #[error("serial link closed")]
    Closed,
    #[error("serial write timeout")]
    Timeout,
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
