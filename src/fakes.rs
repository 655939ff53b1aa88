//! In-memory repositories and a scripted card generator for unit tests.

use std::{
    collections::{HashSet, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        repo::UserRepository,
        repo_types::{NewUser, User},
    },
    cards::{
        generator::{
            parse_generated, CardGenerator, GeneratedCard, GenerationError, GenerationMode,
            GenerationRequest,
        },
        ledger::UserCardLedger,
        repo::CardRepository,
        repo_types::{Card, Difficulty, NewCard, UsageEntry, UserCard, TIPS_PER_CARD},
    },
};

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<User>>,
    cards: Mutex<Vec<Card>>,
    user_cards: Mutex<Vec<UserCard>>,
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let mut users = self.users.lock().unwrap();
        anyhow::ensure!(
            users.iter().all(|u| u.email != user.email),
            "duplicate email {}",
            user.email
        );
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl CardRepository for MemoryStore {
    async fn list_by_category(&self, category: &str) -> anyhow::Result<Vec<Card>> {
        let key = category.trim().to_lowercase();
        let cards = self.cards.lock().unwrap();
        Ok(cards.iter().filter(|c| c.category == key).cloned().collect())
    }

    async fn find_by_category_and_difficulty(
        &self,
        category: &str,
        difficulty: Difficulty,
        exclude_creator: Option<Uuid>,
    ) -> anyhow::Result<Option<Card>> {
        let key = category.trim().to_lowercase();
        let cards = self.cards.lock().unwrap();
        // max_by_key keeps the last of equal timestamps, i.e. the latest insert
        Ok(cards
            .iter()
            .filter(|c| c.category == key && c.difficulty == difficulty.as_str() && c.is_public)
            .filter(|c| exclude_creator.is_none() || c.creator_id != exclude_creator)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn create(&self, card: NewCard) -> anyhow::Result<Card> {
        let card = Card {
            id: Uuid::new_v4(),
            category: card.category.trim().to_lowercase(),
            secret_item: card.secret_item,
            tips: card.tips,
            difficulty: card.difficulty.as_str().to_string(),
            creator_id: card.creator_id,
            is_public: true,
            created_at: OffsetDateTime::now_utc(),
        };
        self.cards.lock().unwrap().push(card.clone());
        Ok(card)
    }

    async fn list_answers_by_category(&self, category: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .list_by_category(category)
            .await?
            .into_iter()
            .map(|c| c.secret_item)
            .collect())
    }
}

#[async_trait]
impl UserCardLedger for MemoryStore {
    async fn record(&self, user_id: Uuid, card_id: Uuid) -> anyhow::Result<UserCard> {
        let mut rows = self.user_cards.lock().unwrap();
        if let Some(existing) = rows
            .iter()
            .find(|r| r.user_id == user_id && r.card_id == card_id)
        {
            return Ok(existing.clone());
        }
        let row = UserCard {
            user_id,
            card_id,
            created_at: OffsetDateTime::now_utc(),
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn has_used(&self, user_id: Uuid, card_id: Uuid) -> anyhow::Result<bool> {
        let rows = self.user_cards.lock().unwrap();
        Ok(rows
            .iter()
            .any(|r| r.user_id == user_id && r.card_id == card_id))
    }

    async fn used_card_ids(&self, user_id: Uuid) -> anyhow::Result<HashSet<Uuid>> {
        let rows = self.user_cards.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.card_id)
            .collect())
    }

    async fn cards_for(&self, category: &str, difficulty: Difficulty) -> anyhow::Result<Vec<Card>> {
        Ok(self
            .list_by_category(category)
            .await?
            .into_iter()
            .filter(|c| c.difficulty == difficulty.as_str())
            .collect())
    }

    async fn history(&self, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<UsageEntry>> {
        let rows = self.user_cards.lock().unwrap().clone();
        let cards = self.cards.lock().unwrap().clone();
        let mut entries: Vec<UsageEntry> = rows
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .filter_map(|r| {
                let card = cards.iter().find(|c| c.id == r.card_id)?;
                Some(UsageEntry {
                    card_id: card.id,
                    category: card.category.clone(),
                    secret_item: card.secret_item.clone(),
                    difficulty: card.difficulty.clone(),
                    used_at: r.created_at,
                })
            })
            .collect();
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }

    async fn count_usage(&self, card_id: Uuid) -> anyhow::Result<i64> {
        let rows = self.user_cards.lock().unwrap();
        Ok(rows.iter().filter(|r| r.card_id == card_id).count() as i64)
    }
}

/// Card generator that answers with queued replies, or a valid card when the queue is empty.
/// Replies go through the real response parser.
#[derive(Default)]
pub struct ScriptedGenerator {
    calls: AtomicUsize,
    replies: Mutex<VecDeque<String>>,
    last: Mutex<Option<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn with_replies(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last.lock().unwrap().clone()
    }

    fn default_reply(req: &GenerationRequest, call: usize) -> String {
        let (secret, difficulty) = match &req.mode {
            GenerationMode::Answer(answer) => (answer.clone(), Difficulty::Easy),
            GenerationMode::Category(d) => (format!("Resposta {call}"), *d),
        };
        let tips: Vec<String> = (1..=TIPS_PER_CARD).map(|i| format!("Dica {i}")).collect();
        json!({
            "category": req.category.as_str(),
            "secret_item": secret,
            "tips": tips,
            "difficulty": difficulty.as_str(),
        })
        .to_string()
    }
}

#[async_trait]
impl CardGenerator for ScriptedGenerator {
    async fn generate(&self, req: &GenerationRequest) -> Result<GeneratedCard, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last.lock().unwrap() = Some(req.clone());
        let queued = self.replies.lock().unwrap().pop_front();
        let text = queued.unwrap_or_else(|| Self::default_reply(req, call));
        parse_generated(&text, req)
    }
}
