use thiserror::Error;

use crate::model::{ParseIdError, SessionStatusError, TimeOfDayError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Id(#[from] ParseIdError),
    #[error(transparent)]
    TimeOfDay(#[from] TimeOfDayError),
    #[error(transparent)]
    SessionStatus(#[from] SessionStatusError),
}
