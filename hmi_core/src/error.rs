use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum BridgeError {
    #[error("serial link error: {0}")]
    Link(String),
    #[error("serial link fault: {0}")]
    LinkFault(String),
    #[error("serial link timeout")]
    Timeout,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("send rejected: {0}")]
    Send(#[from] SendError),
    #[error("profile rejected: {0}")]
    Profile(#[from] ProfileError),
}

/// Failure of an atomic profile save. The committed file is left untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("cannot create temp file {name}: {reason}")]
    CreateTemp { name: String, reason: String },
    #[error("write to {name} failed: {reason}")]
    Write { name: String, reason: String },
    #[error("cannot verify {name}: {reason}")]
    Verify { name: String, reason: String },
    #[error("size mismatch in {name}: wrote {actual} bytes, expected {expected}")]
    SizeMismatch {
        name: String,
        actual: u64,
        expected: u64,
    },
    #[error("cannot commit {from} -> {to}: {reason}")]
    Commit {
        from: String,
        to: String,
        reason: String,
    },
    #[error("too many profiles: {count} exceeds limit {limit}")]
    TooMany { count: usize, limit: usize },
    #[error("background save worker is not running")]
    WorkerGone,
    #[error("background save queue is full")]
    WorkerBusy,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("machine state {state:?} does not allow parameter writes")]
    UnsafeState { state: String },
    #[error("write failed: {0}")]
    Link(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("no profile selected")]
    NoSelection,
    #[error("profile limit of {0} reached")]
    LimitReached(usize),
    #[error("slot 0 mirrors the controller profile and cannot be deleted")]
    MirrorSlot,
    #[error("3D mode needs inject torque > 0.01")]
    TorqueTooLow,
    #[error("2D mode needs fill volume and fill speed > 0.01")]
    FillTooLow,
    #[error("unknown mode {0:?}, expected 2D or 3D")]
    UnknownMode(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing serial link")]
    MissingLink,
    #[error("missing flash filesystem")]
    MissingStorage,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
