use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Card, Difficulty, NewCard};
use crate::text::same_text;

#[async_trait]
pub trait CardRepository: Send + Sync {
    /// All cards of a category (matched against the stored lowercase category).
    async fn list_by_category(&self, category: &str) -> anyhow::Result<Vec<Card>>;

    /// Most recent public card of the category and difficulty not created by `exclude_creator`.
    async fn find_by_category_and_difficulty(
        &self,
        category: &str,
        difficulty: Difficulty,
        exclude_creator: Option<Uuid>,
    ) -> anyhow::Result<Option<Card>>;

    async fn create(&self, card: NewCard) -> anyhow::Result<Card>;

    async fn list_answers_by_category(&self, category: &str) -> anyhow::Result<Vec<String>>;

    /// First card of the category whose answer normalizes to the same text.
    async fn find_by_answer(&self, answer: &str, category: &str) -> anyhow::Result<Option<Card>> {
        let cards = self.list_by_category(category).await?;
        Ok(first_with_answer(cards, answer))
    }
}

pub(crate) fn first_with_answer(cards: Vec<Card>, answer: &str) -> Option<Card> {
    cards
        .into_iter()
        .find(|c| same_text(&c.secret_item, answer))
}

#[derive(Clone)]
pub struct PgCardRepository {
    db: PgPool,
}

impl PgCardRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CardRepository for PgCardRepository {
    async fn list_by_category(&self, category: &str) -> anyhow::Result<Vec<Card>> {
        let rows = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, category, secret_item, tips, difficulty, creator_id, is_public, created_at
              FROM cards
             WHERE category = $1
             ORDER BY created_at ASC
            "#,
        )
        .bind(category.trim().to_lowercase())
        .fetch_all(&self.db)
        .await
        .context("list cards by category")?;
        Ok(rows)
    }

    async fn find_by_category_and_difficulty(
        &self,
        category: &str,
        difficulty: Difficulty,
        exclude_creator: Option<Uuid>,
    ) -> anyhow::Result<Option<Card>> {
        let row = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, category, secret_item, tips, difficulty, creator_id, is_public, created_at
              FROM cards
             WHERE category = $1
               AND difficulty = $2
               AND is_public
               AND ($3::uuid IS NULL OR creator_id IS DISTINCT FROM $3)
             ORDER BY created_at DESC
             LIMIT 1
            "#,
        )
        .bind(category.trim().to_lowercase())
        .bind(difficulty.as_str())
        .bind(exclude_creator) // Option<Uuid> → NULL disables the filter
        .fetch_optional(&self.db)
        .await
        .context("find card by category and difficulty")?;
        Ok(row)
    }

    async fn create(&self, card: NewCard) -> anyhow::Result<Card> {
        let row = sqlx::query_as::<_, Card>(
            r#"
            INSERT INTO cards (category, secret_item, tips, difficulty, creator_id, is_public)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING id, category, secret_item, tips, difficulty, creator_id, is_public, created_at
            "#,
        )
        .bind(card.category.trim().to_lowercase())
        .bind(card.secret_item)
        .bind(card.tips)
        .bind(card.difficulty.as_str())
        .bind(card.creator_id)
        .fetch_one(&self.db)
        .await
        .context("insert card")?;
        Ok(row)
    }

    async fn list_answers_by_category(&self, category: &str) -> anyhow::Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"SELECT secret_item FROM cards WHERE category = $1 ORDER BY created_at ASC"#,
        )
        .bind(category.trim().to_lowercase())
        .fetch_all(&self.db)
        .await
        .context("list answers by category")?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }
}
