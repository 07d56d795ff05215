use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Code identifying an opening in the catalog sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpeningId(pub String);

impl OpeningId {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpeningId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Answer key, also the Responses column name.
    pub key: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOpening {
    pub id: OpeningId,
    pub title: String,
    pub questions: Vec<Question>,
}

impl JobOpening {
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }
}

/// Immutable snapshot of every opening loaded from one configuration read.
#[derive(Debug, Clone, Default)]
pub struct OpeningCatalog {
    openings: Vec<Arc<JobOpening>>,
    index: HashMap<OpeningId, usize>,
}

impl OpeningCatalog {
    /// Keeps the order in which openings are given; later duplicates replace earlier ones.
    pub fn new(openings: Vec<JobOpening>) -> Self {
        let mut catalog = Self::default();
        for opening in openings {
            match catalog.index.get(&opening.id) {
                Some(&position) => catalog.openings[position] = Arc::new(opening),
                None => {
                    catalog
                        .index
                        .insert(opening.id.clone(), catalog.openings.len());
                    catalog.openings.push(Arc::new(opening));
                }
            }
        }
        catalog
    }

    pub fn get(&self, id: &OpeningId) -> Option<&Arc<JobOpening>> {
        self.index
            .get(id)
            .and_then(|&position| self.openings.get(position))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<JobOpening>> {
        self.openings.iter()
    }

    pub fn len(&self) -> usize {
        self.openings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.openings.is_empty()
    }

    pub fn question_total(&self) -> usize {
        self.openings.iter().map(|opening| opening.questions.len()).sum()
    }

    /// Every question key asked by any opening.
    pub fn required_keys(&self) -> BTreeSet<String> {
        self.openings
            .iter()
            .flat_map(|opening| opening.questions.iter().map(|q| q.key.clone()))
            .collect()
    }

    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            openings: self.len(),
            questions: self.question_total(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    pub openings: usize,
    pub questions: usize,
}

/// Platform chat identifier; sessions are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    ChoosingOpening,
    AskingQuestions,
    AwaitingResume,
}

impl SessionPhase {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ChoosingOpening => "Choosing opening",
            Self::AskingQuestions => "Asking questions",
            Self::AwaitingResume => "Awaiting resume",
        }
    }
}

/// One chat's in-progress attempt. A chat without a state is idle.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub phase: SessionPhase,
    /// Pinned at selection so a reload cannot change the questions mid-conversation.
    pub opening: Option<Arc<JobOpening>>,
    pub question_index: usize,
    pub answers: BTreeMap<String, String>,
}

impl SessionState {
    pub fn choosing() -> Self {
        Self {
            phase: SessionPhase::ChoosingOpening,
            opening: None,
            question_index: 0,
            answers: BTreeMap::new(),
        }
    }

    /// Starts the question round for `opening`, skipping straight to the resume
    /// step when it has no questions.
    pub fn for_opening(opening: Arc<JobOpening>) -> Self {
        let phase = if opening.questions.is_empty() {
            SessionPhase::AwaitingResume
        } else {
            SessionPhase::AskingQuestions
        };
        Self {
            phase,
            opening: Some(opening),
            question_index: 0,
            answers: BTreeMap::new(),
        }
    }

    pub fn opening_id(&self) -> Option<&OpeningId> {
        self.opening.as_ref().map(|opening| &opening.id)
    }

    pub fn pending_question(&self) -> Option<&Question> {
        match self.phase {
            SessionPhase::AskingQuestions => self
                .opening
                .as_ref()
                .and_then(|opening| opening.question(self.question_index)),
            _ => None,
        }
    }

    /// Stores the answer for the pending question and advances. Returns the next
    /// question, or `None` once the session has moved on to the resume step.
    pub fn record_answer(&mut self, raw: &str) -> Option<&Question> {
        let opening = self.opening.clone()?;
        if self.phase != SessionPhase::AskingQuestions {
            return None;
        }
        if let Some(question) = opening.question(self.question_index) {
            self.answers
                .insert(question.key.clone(), raw.trim().to_string());
        }

        self.question_index = (self.question_index + 1).min(opening.question_count());
        if self.question_index == opening.question_count() {
            self.phase = SessionPhase::AwaitingResume;
            return None;
        }
        self.pending_question()
    }
}

/// Answer value written to the Responses sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Number(f64),
}

impl AnswerValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(text) if text.is_empty())
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(value) => write!(f, "{value}"),
        }
    }
}

/// Key whose answer gets a best-effort numeric parse at assembly time.
pub const EXPERIENCE_YEARS_KEY: &str = "experience_years";

/// Parses `5`, `2.5` or `2,5`; anything else stays as text.
pub fn coerce_experience(raw: &str) -> AnswerValue {
    let trimmed = raw.trim();
    match trimmed.replace(',', ".").parse::<f64>() {
        Ok(value) if value.is_finite() => AnswerValue::Number(value),
        _ => AnswerValue::Text(raw.to_string()),
    }
}

/// Finalized application; written once as a single Responses row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRecord {
    pub submitted_at: DateTime<Utc>,
    pub opening_id: OpeningId,
    pub opening_title: String,
    pub user_id: i64,
    pub username: Option<String>,
    pub answers: BTreeMap<String, AnswerValue>,
    pub resume_link: String,
}

impl SubmissionRecord {
    pub fn assemble(
        opening: &JobOpening,
        user: &UserIdentity,
        answers: &BTreeMap<String, String>,
        resume_link: &str,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        let answers = answers
            .iter()
            .map(|(key, value)| {
                let value = if key == EXPERIENCE_YEARS_KEY && !value.is_empty() {
                    coerce_experience(value)
                } else {
                    AnswerValue::Text(value.clone())
                };
                (key.clone(), value)
            })
            .collect();

        Self {
            submitted_at,
            opening_id: opening.id.clone(),
            opening_title: opening.title.clone(),
            user_id: user.user_id,
            username: user.username.clone(),
            answers,
            resume_link: resume_link.trim().to_string(),
        }
    }

    /// Non-empty answer text for `key`.
    pub fn answer(&self, key: &str) -> Option<String> {
        self.answers
            .get(key)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
    }
}
