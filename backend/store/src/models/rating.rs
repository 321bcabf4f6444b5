use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{database::Document, error::DomainError};

/// Unique index from `<donation>:<rater>` to the rating id.
pub const RATER_INDEX: &str = "rating-rater";

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Rating<U = Uuid> {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub donation: Uuid,
    pub rater: U,
    pub donor: Uuid,
    pub stars: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Rating {
    const COLLECTION: &'static str = "ratings";
    const KIND: &'static str = "Rating";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Rating {
    pub fn new(
        donation: Uuid,
        rater: Uuid,
        donor: Uuid,
        stars: i64,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let stars = u8::try_from(stars)
            .ok()
            .filter(|stars| (1..=5).contains(stars))
            .ok_or(DomainError::InvalidStars)?;

        Ok(Self {
            id: Uuid::new_v4(),
            donation,
            rater,
            donor,
            stars,
            comment,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn rater_key(donation: Uuid, rater: Uuid) -> String {
        format!("{donation}:{rater}")
    }

    pub fn populate<V>(self, populate: impl FnOnce(Uuid) -> V) -> Rating<V> {
        Rating {
            id: self.id,
            donation: self.donation,
            rater: populate(self.rater),
            donor: self.donor,
            stars: self.stars,
            comment: self.comment,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct RatingSummary<U> {
    pub average: f64,
    pub count: usize,
    pub ratings: Vec<Rating<U>>,
}

impl<U> RatingSummary<U> {
    pub fn new(ratings: Vec<Rating<U>>) -> Self {
        let count = ratings.len();
        let average = if count == 0 {
            0.0
        } else {
            ratings.iter().map(|rating| f64::from(rating.stars)).sum::<f64>() / count as f64
        };

        Self {
            average,
            count,
            ratings,
        }
    }
}
