use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CountError {
    #[error("segment size must be at least 1")]
    SegmentSize,

    #[error("worker count must be at least 1")]
    Workers,
}
