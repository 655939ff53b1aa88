use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::repo_types::{Category, Difficulty, TIPS_PER_CARD};
use crate::config::GeminiConfig;

const GENERIC_FAILURE: &str = "Falha ao gerar carta. Tente novamente.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("model request failed: {0:#}")]
    Upstream(anyhow::Error),

    #[error("model response is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("model response is missing required fields")]
    MissingFields,

    #[error("expected 20 tips, got {0}")]
    TipCount(usize),

    #[error("model returned unknown difficulty {0:?}")]
    InvalidDifficulty(String),

    #[error("model chose an existing answer: {0}")]
    Duplicate(String),
}

impl GenerationError {
    /// Message safe to return to clients. Transport and parse details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            GenerationError::Upstream(_) | GenerationError::Malformed(_) => GENERIC_FAILURE.into(),
            GenerationError::MissingFields => "Resposta inválida do modelo".into(),
            GenerationError::TipCount(_) => "Número de dicas inválido".into(),
            GenerationError::InvalidDifficulty(_) => {
                "Dificuldade inválida na resposta do modelo".into()
            }
            GenerationError::Duplicate(_) => {
                "O modelo gerou uma carta duplicada. Tente novamente.".into()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationMode {
    /// The caller picked the answer; the model writes the tips and rates the difficulty.
    Answer(String),
    /// The model picks an unseen answer at the requested difficulty.
    Category(Difficulty),
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub category: Category,
    pub mode: GenerationMode,
    pub existing_answers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCard {
    pub category: String,
    pub secret_item: String,
    pub tips: Vec<String>,
    pub difficulty: Difficulty,
}

#[async_trait]
pub trait CardGenerator: Send + Sync {
    async fn generate(&self, req: &GenerationRequest) -> Result<GeneratedCard, GenerationError>;
}

const SPECIAL_TIPS: &str = r#"   - "Perca a vez"
   - "Um palpite a qualquer hora"
   - "Avance X casas" (X = 1, 2 or 3)
   - "Volte X casas" (X = 1, 2 or 3)
   - "Escolha um jogador para voltar X casas" (X = 1, 2 or 3)"#;

pub fn build_prompt(req: &GenerationRequest) -> String {
    let category = req.category.as_str();
    let mut prompt = String::from("You write cards for the guessing game \"Perfil\".\n\n");

    match &req.mode {
        GenerationMode::Answer(answer) => {
            prompt.push_str(&format!(
                "Write a card for the category \"{category}\" whose answer is \"{answer}\".\n"
            ));
            push_existing(&mut prompt, &req.existing_answers, "do not duplicate them");
            prompt.push_str(&format!(
                "\nRules:\n\
                 1. Exactly {TIPS_PER_CARD} tips, all in Portuguese.\n\
                 2. Shuffle tip difficulty; tips must not get progressively easier.\n\
                 3. Never write the answer itself in any tip.\n\
                 4. Rate the card difficulty by how well known the answer is: fácil, médio or difícil.\n\
                 5. Between 0 and 2 of the {TIPS_PER_CARD} tips may be special tips taken from:\n\
                 {SPECIAL_TIPS}\n\
                 6. Keep \"secret_item\" exactly as given, including case and accents.\n"
            ));
            prompt.push_str(&format!(
                "\nReply with JSON only:\n\
                 {{\"category\": \"{category}\", \"secret_item\": \"{answer}\", \
                 \"tips\": [\"tip 1\", \"...\", \"tip {TIPS_PER_CARD}\"], \
                 \"difficulty\": \"fácil|médio|difícil\"}}\n"
            ));
        }
        GenerationMode::Category(difficulty) => {
            prompt.push_str(&format!(
                "Write a card for the category \"{category}\" at difficulty \"{difficulty}\".\n"
            ));
            push_existing(
                &mut prompt,
                &req.existing_answers,
                "your answer MUST NOT be any of them",
            );
            prompt.push_str(&format!(
                "\nRules:\n\
                 1. Choose an answer that fits the category and difficulty: fácil is very well known, \
                 médio is known but not obvious, difícil is obscure or specific.\n\
                 2. The answer must not appear in the existing answers above.\n\
                 3. Exactly {TIPS_PER_CARD} tips, all in Portuguese.\n\
                 4. Shuffle tip difficulty; tips must not get progressively easier.\n\
                 5. Never write the answer itself in any tip.\n\
                 6. Between 0 and 2 of the {TIPS_PER_CARD} tips may be special tips taken from:\n\
                 {SPECIAL_TIPS}\n"
            ));
            prompt.push_str(&format!(
                "\nReply with JSON only:\n\
                 {{\"category\": \"{category}\", \"secret_item\": \"chosen answer\", \
                 \"tips\": [\"tip 1\", \"...\", \"tip {TIPS_PER_CARD}\"], \
                 \"difficulty\": \"{difficulty}\"}}\n"
            ));
        }
    }
    prompt
}

fn push_existing(prompt: &mut String, existing: &[String], instruction: &str) {
    if existing.is_empty() {
        prompt.push_str("\nThis category has no cards yet.\n");
        return;
    }
    prompt.push_str(&format!(
        "\nAnswers already used in this category ({instruction}):\n"
    ));
    for answer in existing {
        prompt.push_str("- ");
        prompt.push_str(answer);
        prompt.push('\n');
    }
}

/// Removes the markdown code fences the model likes to wrap JSON in.
pub fn strip_code_fences(text: &str) -> String {
    lazy_static! {
        static ref FENCE_RE: Regex = Regex::new(r"```(?:json)?\n?").unwrap();
    }
    FENCE_RE.replace_all(text, "").trim().to_string()
}

#[derive(Debug, Deserialize)]
struct RawCard {
    category: Option<String>,
    secret_item: Option<String>,
    tips: Option<Vec<String>>,
    difficulty: Option<String>,
}

fn present(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parses and validates the model's reply against the request it answers.
pub fn parse_generated(text: &str, req: &GenerationRequest) -> Result<GeneratedCard, GenerationError> {
    let raw: RawCard = serde_json::from_str(&strip_code_fences(text))?;

    let (Some(_), Some(secret_item), Some(tips), Some(difficulty)) = (
        present(raw.category),
        present(raw.secret_item),
        raw.tips,
        present(raw.difficulty),
    ) else {
        return Err(GenerationError::MissingFields);
    };

    if tips.len() != TIPS_PER_CARD {
        return Err(GenerationError::TipCount(tips.len()));
    }

    let parsed_difficulty = Difficulty::parse_lenient(&difficulty)
        .ok_or_else(|| GenerationError::InvalidDifficulty(difficulty.clone()))?;

    let (secret_item, difficulty) = match &req.mode {
        GenerationMode::Answer(answer) => (answer.trim().to_string(), parsed_difficulty),
        GenerationMode::Category(requested) => {
            let key = secret_item.to_lowercase();
            if req
                .existing_answers
                .iter()
                .any(|a| a.trim().to_lowercase() == key)
            {
                return Err(GenerationError::Duplicate(secret_item));
            }
            if parsed_difficulty != *requested {
                warn!(requested = %requested, returned = %parsed_difficulty, "model changed the difficulty");
            }
            (secret_item, *requested)
        }
    };

    Ok(GeneratedCard {
        category: req.category.as_str().to_string(),
        secret_item,
        tips,
        difficulty,
    })
}

// --- Gemini REST client ---

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<PartIn<'a>>,
}

#[derive(Debug, Serialize)]
struct PartIn<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartOut>,
}

#[derive(Debug, Deserialize)]
struct PartOut {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(self) -> Option<String> {
        let parts = self.candidates.into_iter().next()?.content?.parts;
        let text: String = parts.into_iter().filter_map(|p| p.text).collect();
        (!text.is_empty()).then_some(text)
    }
}

/// Client for the Gemini `generateContent` endpoint. Built once at startup.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    cfg: GeminiConfig,
}

impl GeminiClient {
    pub fn new(cfg: GeminiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            cfg,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.model
        )
    }

    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![PartIn { text: prompt }],
            }],
        };
        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .context("send generateContent request")?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("gemini returned {status}: {detail}");
        }

        let parsed: GenerateContentResponse =
            resp.json().await.context("decode generateContent response")?;
        parsed.text().context("gemini response carries no text")
    }
}

#[async_trait]
impl CardGenerator for GeminiClient {
    #[instrument(skip(self, req), fields(category = %req.category, model = %self.cfg.model))]
    async fn generate(&self, req: &GenerationRequest) -> Result<GeneratedCard, GenerationError> {
        let prompt = build_prompt(req);
        let text = self
            .complete(&prompt)
            .await
            .map_err(GenerationError::Upstream)?;
        debug!(bytes = text.len(), "model replied");
        parse_generated(&text, req)
    }
}
