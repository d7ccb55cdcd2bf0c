use sea_orm::DbErr;
use thiserror::Error;

/// Error vocabulary shared by the comment entity and every service.
///
/// Callers are expected to match on the variant; none of these are retried
/// internally.
#[derive(Debug, Error)]
pub enum CommentsError {
    #[error("fatal database error")]
    Db(#[from] DbErr),

    #[error("comment not found")]
    NotFound,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("the id of a comment cannot be changed once set")]
    IllegalIdentityChange,

    #[error("comment message exceeds allowed character limit of {limit}")]
    MessageTooLong { limit: usize },

    #[error("unexpected value: {0}")]
    UnexpectedValue(&'static str),

    #[error("{0}")]
    OutOfBounds(&'static str),
}

impl CommentsError {
    /// Collapses `RecordNotUpdated` into the domain's not-found kind; an
    /// update that matched no rows means the comment ceased to exist.
    pub(crate) fn from_update(err: DbErr) -> Self {
        match err {
            DbErr::RecordNotUpdated => CommentsError::NotFound,
            other => CommentsError::Db(other),
        }
    }
}
