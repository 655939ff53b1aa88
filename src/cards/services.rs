use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::GenerateCardRequest,
    generator::{GenerationMode, GenerationRequest},
    repo_types::{Card, Category, Difficulty, NewCard},
};
use crate::{
    auth::extractors::Identity,
    error::{AppError, AppResult},
    state::AppState,
};

pub const MSG_FROM_DATABASE: &str = "Carta já existe no banco de dados";
pub const MSG_GENERATED: &str = "Carta gerada com sucesso";

/// Outcome of a generate request. `warnings` carries failures of best-effort bookkeeping
/// (usage recording) that did not stop the card from being delivered.
#[derive(Debug)]
pub struct Resolution {
    pub card: Card,
    pub from_database: bool,
    pub warnings: Vec<String>,
}

impl Resolution {
    pub fn message(&self) -> &'static str {
        if self.from_database {
            MSG_FROM_DATABASE
        } else {
            MSG_GENERATED
        }
    }
}

enum SecretItem {
    Absent,
    Given(String),
    Invalid,
}

// Null, "" and false select category mode; any other non-string is rejected.
fn secret_item(v: Option<Value>) -> SecretItem {
    match v {
        None | Some(Value::Null) | Some(Value::Bool(false)) => SecretItem::Absent,
        Some(Value::String(s)) if s.is_empty() => SecretItem::Absent,
        Some(Value::String(s)) => SecretItem::Given(s),
        Some(_) => SecretItem::Invalid,
    }
}

fn parse_category(v: Option<Value>) -> AppResult<Category> {
    let Some(Value::String(raw)) = v else {
        return Err(AppError::BadRequest("Categoria é obrigatória".into()));
    };
    if raw.trim().is_empty() {
        return Err(AppError::BadRequest("Categoria é obrigatória".into()));
    }
    Category::parse(&raw).ok_or_else(|| {
        warn!(category = %raw, "unknown category");
        AppError::BadRequest("Categoria inválida".into())
    })
}

pub(crate) fn parse_difficulty(raw: &str) -> AppResult<Difficulty> {
    Difficulty::parse(raw).ok_or_else(|| {
        AppError::BadRequest("Dificuldade inválida. Use: fácil, médio ou difícil".into())
    })
}

/// Answer mode reuses any card whose answer matches after normalization; category mode reuses
/// the newest public card the user did not create. Otherwise a new card is generated and stored.
///
/// The check-then-insert sequence is not serialized: two concurrent requests for the same new
/// answer can both generate and store a card.
#[instrument(skip(state, body, identity), fields(user_id = ?identity.as_ref().map(|i| i.id)))]
pub async fn resolve_card(
    state: &AppState,
    body: GenerateCardRequest,
    identity: Option<Identity>,
) -> AppResult<Resolution> {
    let category = parse_category(body.category)?;

    match secret_item(body.secret_item) {
        SecretItem::Given(answer) if !answer.trim().is_empty() => {
            resolve_by_answer(state, category, answer.trim(), identity.as_ref()).await
        }
        SecretItem::Given(_) | SecretItem::Invalid => Err(AppError::BadRequest(
            "Resposta da carta é obrigatória".into(),
        )),
        SecretItem::Absent => {
            let Some(user) = identity else {
                return Err(AppError::Unauthorized(
                    "Para gerar carta por categoria e dificuldade, você precisa estar logado"
                        .into(),
                ));
            };
            let difficulty = match body.difficulty {
                Some(Value::String(raw)) if !raw.is_empty() => parse_difficulty(&raw)?,
                _ => {
                    return Err(AppError::BadRequest(
                        "Dificuldade é obrigatória quando não especificada a resposta".into(),
                    ))
                }
            };
            resolve_by_category(state, category, difficulty, &user).await
        }
    }
}

async fn resolve_by_answer(
    state: &AppState,
    category: Category,
    answer: &str,
    identity: Option<&Identity>,
) -> AppResult<Resolution> {
    let mut warnings = Vec::new();

    if let Some(card) = state.cards.find_by_answer(answer, category.as_str()).await? {
        info!(card_id = %card.id, "answer already has a card");
        if let Some(user) = identity {
            record_usage(state, user.id, card.id, &mut warnings).await;
        }
        return Ok(Resolution {
            card,
            from_database: true,
            warnings,
        });
    }

    let request = GenerationRequest {
        category,
        mode: GenerationMode::Answer(answer.to_string()),
        existing_answers: existing_answers(state, category).await,
    };
    let card = generate_and_store(state, &request, identity.map(|u| u.id)).await?;
    if let Some(user) = identity {
        record_usage(state, user.id, card.id, &mut warnings).await;
    }

    Ok(Resolution {
        card,
        from_database: false,
        warnings,
    })
}

async fn resolve_by_category(
    state: &AppState,
    category: Category,
    difficulty: Difficulty,
    user: &Identity,
) -> AppResult<Resolution> {
    let mut warnings = Vec::new();

    let existing = state
        .cards
        .find_by_category_and_difficulty(category.as_str(), difficulty, Some(user.id))
        .await?;
    if let Some(card) = existing {
        info!(card_id = %card.id, "reusing public card");
        record_usage(state, user.id, card.id, &mut warnings).await;
        return Ok(Resolution {
            card,
            from_database: true,
            warnings,
        });
    }

    let request = GenerationRequest {
        category,
        mode: GenerationMode::Category(difficulty),
        existing_answers: existing_answers(state, category).await,
    };
    let card = generate_and_store(state, &request, Some(user.id)).await?;
    record_usage(state, user.id, card.id, &mut warnings).await;

    Ok(Resolution {
        card,
        from_database: false,
        warnings,
    })
}

async fn generate_and_store(
    state: &AppState,
    request: &GenerationRequest,
    creator_id: Option<Uuid>,
) -> AppResult<Card> {
    let generated = state.generator.generate(request).await?;
    let card = state
        .cards
        .create(NewCard {
            category: generated.category,
            secret_item: generated.secret_item,
            tips: generated.tips,
            difficulty: generated.difficulty,
            creator_id,
        })
        .await?;
    info!(card_id = %card.id, category = %card.category, difficulty = %card.difficulty, "card generated");
    Ok(card)
}

// Context only: a failed lookup must not block generation.
async fn existing_answers(state: &AppState, category: Category) -> Vec<String> {
    match state.cards.list_answers_by_category(category.as_str()).await {
        Ok(answers) => answers,
        Err(e) => {
            warn!(error = %e, category = %category, "could not load existing answers");
            Vec::new()
        }
    }
}

async fn record_usage(state: &AppState, user_id: Uuid, card_id: Uuid, warnings: &mut Vec<String>) {
    if let Err(e) = state.ledger.record(user_id, card_id).await {
        warn!(error = %e, %user_id, %card_id, "failed to record card usage");
        warnings.push("Não foi possível registrar o uso da carta".into());
    }
}
