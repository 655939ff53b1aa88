use std::collections::HashSet;

use anyhow::Context;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Card, Difficulty, UsageEntry, UserCard};

/// Which user has been served which card, at most once per pair.
#[async_trait]
pub trait UserCardLedger: Send + Sync {
    /// Idempotent: an existing (user, card) record is returned unchanged.
    async fn record(&self, user_id: Uuid, card_id: Uuid) -> anyhow::Result<UserCard>;

    async fn has_used(&self, user_id: Uuid, card_id: Uuid) -> anyhow::Result<bool>;

    async fn used_card_ids(&self, user_id: Uuid) -> anyhow::Result<HashSet<Uuid>>;

    /// Every card of the category and difficulty, regardless of visibility.
    async fn cards_for(&self, category: &str, difficulty: Difficulty) -> anyhow::Result<Vec<Card>>;

    async fn history(&self, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<UsageEntry>>;

    /// Number of distinct users that have used a card.
    async fn count_usage(&self, card_id: Uuid) -> anyhow::Result<i64>;

    async fn find_unused(
        &self,
        user_id: Uuid,
        category: &str,
        difficulty: Difficulty,
    ) -> anyhow::Result<Option<Card>> {
        let unused = self.unused(user_id, category, difficulty).await?;
        Ok(unused.choose(&mut rand::thread_rng()).cloned())
    }

    async fn count_unused(
        &self,
        user_id: Uuid,
        category: &str,
        difficulty: Difficulty,
    ) -> anyhow::Result<usize> {
        Ok(self.unused(user_id, category, difficulty).await?.len())
    }

    async fn unused(
        &self,
        user_id: Uuid,
        category: &str,
        difficulty: Difficulty,
    ) -> anyhow::Result<Vec<Card>> {
        let used = self.used_card_ids(user_id).await?;
        let cards = self.cards_for(category, difficulty).await?;
        Ok(without_used(cards, &used))
    }
}

pub(crate) fn without_used(cards: Vec<Card>, used: &HashSet<Uuid>) -> Vec<Card> {
    cards.into_iter().filter(|c| !used.contains(&c.id)).collect()
}

#[derive(Clone)]
pub struct PgUserCardLedger {
    db: PgPool,
}

impl PgUserCardLedger {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find(&self, user_id: Uuid, card_id: Uuid) -> anyhow::Result<Option<UserCard>> {
        let row = sqlx::query_as::<_, UserCard>(
            r#"
            SELECT user_id, card_id, created_at
              FROM user_cards
             WHERE user_id = $1 AND card_id = $2
            "#,
        )
        .bind(user_id)
        .bind(card_id)
        .fetch_optional(&self.db)
        .await
        .context("find user card")?;
        Ok(row)
    }
}

#[async_trait]
impl UserCardLedger for PgUserCardLedger {
    async fn record(&self, user_id: Uuid, card_id: Uuid) -> anyhow::Result<UserCard> {
        if let Some(existing) = self.find(user_id, card_id).await? {
            return Ok(existing);
        }

        // The primary key absorbs a concurrent insert of the same pair.
        let inserted = sqlx::query_as::<_, UserCard>(
            r#"
            INSERT INTO user_cards (user_id, card_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, card_id) DO NOTHING
            RETURNING user_id, card_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(card_id)
        .fetch_optional(&self.db)
        .await
        .context("insert user card")?;

        match inserted {
            Some(row) => Ok(row),
            None => self
                .find(user_id, card_id)
                .await?
                .context("user card vanished after conflicting insert"),
        }
    }

    async fn has_used(&self, user_id: Uuid, card_id: Uuid) -> anyhow::Result<bool> {
        Ok(self.find(user_id, card_id).await?.is_some())
    }

    async fn used_card_ids(&self, user_id: Uuid) -> anyhow::Result<HashSet<Uuid>> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as(r#"SELECT card_id FROM user_cards WHERE user_id = $1"#)
                .bind(user_id)
                .fetch_all(&self.db)
                .await
                .context("list used card ids")?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn cards_for(&self, category: &str, difficulty: Difficulty) -> anyhow::Result<Vec<Card>> {
        let rows = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, category, secret_item, tips, difficulty, creator_id, is_public, created_at
              FROM cards
             WHERE category = $1 AND difficulty = $2
            "#,
        )
        .bind(category.trim().to_lowercase())
        .bind(difficulty.as_str())
        .fetch_all(&self.db)
        .await
        .context("list cards by category and difficulty")?;
        Ok(rows)
    }

    async fn history(&self, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<UsageEntry>> {
        let rows = sqlx::query_as::<_, UsageEntry>(
            r#"
            SELECT c.id AS card_id, c.category, c.secret_item, c.difficulty, uc.created_at AS used_at
              FROM user_cards uc
              JOIN cards c ON c.id = uc.card_id
             WHERE uc.user_id = $1
             ORDER BY uc.created_at DESC
             LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("user card history")?;
        Ok(rows)
    }

    async fn count_usage(&self, card_id: Uuid) -> anyhow::Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as(r#"SELECT COUNT(*) FROM user_cards WHERE card_id = $1"#)
                .bind(card_id)
                .fetch_one(&self.db)
                .await
                .context("count card usage")?;
        Ok(count)
    }
}
