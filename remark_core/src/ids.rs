use sea_orm::{
    sea_query::{ArrayType, Nullable, ValueType, ValueTypeErr},
    DbErr, QueryResult, TryFromU64, TryGetError, TryGetable, Value,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CommentsError;

/// Persisted comment row id.
///
/// The public API hands ids around as opaque strings: `""` marks a comment
/// that was never saved and `"0"` marks the root parent reference. Stored
/// ids are always positive integers assigned by the database, which is what
/// the since-cursor pagination and the reaction recency ordering rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(i64);

/// Parent reference of a top-level comment.
pub const ROOT_ID: &str = "0";

impl CommentId {
    /// Parses an id off the string surface. Anything that is not a positive
    /// integer (`""`, `"0"`, `"%"`, `"2b"`) is rejected.
    pub fn parse_str(s: &str) -> Result<Self, CommentsError> {
        match s.parse::<i64>() {
            Ok(v) if v > 0 => Ok(Self(v)),
            _ => Err(CommentsError::InvalidArgument(
                "ids must be translatable to a positive number",
            )),
        }
    }

    /// Parses a pagination cursor, where `"0"` (and absence, handled by the
    /// caller) means "no anchor".
    pub fn parse_cursor(s: &str) -> Result<Option<Self>, CommentsError> {
        match s.parse::<i64>() {
            Ok(0) => Ok(None),
            Ok(v) if v > 0 => Ok(Some(Self(v))),
            _ => Err(CommentsError::InvalidArgument(
                "cursor ids must be translatable to a number",
            )),
        }
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CommentId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

impl From<CommentId> for i64 {
    fn from(id: CommentId) -> Self {
        id.0
    }
}

// SeaORM trait implementations
impl From<CommentId> for Value {
    fn from(id: CommentId) -> Self {
        Value::BigInt(Some(id.0))
    }
}

impl TryGetable for CommentId {
    fn try_get_by<I: sea_orm::ColIdx>(res: &QueryResult, idx: I) -> Result<Self, TryGetError> {
        let v: i64 = res.try_get_by(idx).map_err(TryGetError::DbErr)?;
        Ok(Self(v))
    }
}

impl ValueType for CommentId {
    fn try_from(v: Value) -> Result<Self, ValueTypeErr> {
        match v {
            Value::BigInt(Some(v)) => Ok(Self(v)),
            Value::Int(Some(v)) => Ok(Self(v as i64)),
            _ => Err(ValueTypeErr),
        }
    }

    fn type_name() -> String {
        stringify!(CommentId).to_owned()
    }

    fn array_type() -> ArrayType {
        ArrayType::BigInt
    }

    fn column_type() -> sea_orm::ColumnType {
        sea_orm::ColumnType::BigInteger
    }
}

impl Nullable for CommentId {
    fn null() -> Value {
        Value::BigInt(None)
    }
}

impl TryFromU64 for CommentId {
    fn try_from_u64(n: u64) -> Result<Self, DbErr> {
        <i64 as TryFrom<u64>>::try_from(n)
            .map(Self)
            .map_err(|_| DbErr::ConvertFromU64(stringify!(CommentId)))
    }
}
