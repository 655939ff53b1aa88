use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::text::normalize;

pub const TIPS_PER_CARD: usize = 20;

/// A stored card. Category and difficulty are kept lowercased; the answer keeps its case and accents.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Card {
    pub id: Uuid,
    pub category: String,
    pub secret_item: String,
    pub tips: Vec<String>,
    pub difficulty: String,
    #[serde(skip_serializing)]
    pub creator_id: Option<Uuid>,
    #[serde(skip_serializing)]
    pub is_public: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields needed to insert a card.
#[derive(Debug, Clone)]
pub struct NewCard {
    pub category: String,
    pub secret_item: String,
    pub tips: Vec<String>,
    pub difficulty: Difficulty,
    pub creator_id: Option<Uuid>,
}

/// One row of the usage ledger.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserCard {
    pub user_id: Uuid,
    pub card_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Ledger row joined with a summary of the card.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UsageEntry {
    pub card_id: Uuid,
    pub category: String,
    pub secret_item: String,
    pub difficulty: String,
    #[serde(with = "time::serde::rfc3339")]
    pub used_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(rename = "fácil")]
    Easy,
    #[serde(rename = "médio")]
    Medium,
    #[serde(rename = "difícil")]
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "fácil",
            Difficulty::Medium => "médio",
            Difficulty::Hard => "difícil",
        }
    }

    /// Strict whitelist match: case-insensitive, accents required.
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_lowercase();
        Self::ALL.into_iter().find(|d| d.as_str() == lowered)
    }

    /// Accent-insensitive match, used for model output ("medio", "Fácil").
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let key = normalize(raw);
        Self::ALL.into_iter().find(|d| normalize(d.as_str()) == key)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Person,
    Place,
    Object,
    Animal,
    Profession,
    Movie,
    Music,
    Food,
    Sport,
    Brand,
    Celebrity,
    Character,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::Person,
        Category::Place,
        Category::Object,
        Category::Animal,
        Category::Profession,
        Category::Movie,
        Category::Music,
        Category::Food,
        Category::Sport,
        Category::Brand,
        Category::Celebrity,
        Category::Character,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Person => "pessoa",
            Category::Place => "lugar",
            Category::Object => "objeto",
            Category::Animal => "animal",
            Category::Profession => "profissão",
            Category::Movie => "filme",
            Category::Music => "música",
            Category::Food => "comida",
            Category::Sport => "esporte",
            Category::Brand => "marca",
            Category::Celebrity => "celebridade",
            Category::Character => "personagem",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.to_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == lowered)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
