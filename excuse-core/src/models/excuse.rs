use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// A stored excuse. `created_at` is kept in its canonical text form; parsing
/// happens at the edges so that a corrupt value is reported, not defaulted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExcuseRecord {
    pub id: i64,
    pub text: String,
    pub rating: Option<i64>,
    pub created_at: String,
}

/// One row of the recent-history listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub text: String,
    pub rating: Option<i64>,
    pub formatted_time: String,
}

/// Quality rating on the 1–5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: i64 = 1;
    pub const MAX: i64 = 5;

    pub fn new(value: i64) -> Result<Self, StoreError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(StoreError::InvalidRating(value))
        }
    }

    pub fn value(self) -> i64 {
        i64::from(self.0)
    }
}

impl TryFrom<i64> for Rating {
    type Error = StoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Rating::new(value)
    }
}

impl From<Rating> for i64 {
    fn from(rating: Rating) -> Self {
        rating.value()
    }
}
