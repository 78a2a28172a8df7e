use crate::training::TrainingError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DictError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dictionary training failed: {0}")]
    Training(#[from] TrainingError),

    #[error("block address already placed: block {0}")]
    AlreadyPlaced(u64),

    #[error("reservation is no longer at the image tail")]
    StaleReservation,

    #[error("side file corrupted: {0}")]
    SideFile(String),
}

pub type Result<T> = std::result::Result<T, DictError>;
