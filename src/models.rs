use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::lenient;

pub const GUEST_USER: &str = "guest";
pub const DEFAULT_MODE: &str = "normal";

/// Question identifier -> question.
pub type Catalog = HashMap<String, Question>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Reorder,
    Vocab,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Reorder => "reorder",
            QuestionType::Vocab => "vocab",
        }
    }
}

/// Catalog entry with its resolved type
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: String,
    pub jp: Option<String>,
    pub en: Option<String>,
    pub unit: Option<String>,
    #[serde(rename = "type")]
    pub kind: QuestionType,
}

/// One quiz attempt as stored in the results log.
/// Every field is optional; the accessors below define the fallbacks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub user: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub ended_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub received_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub mode: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub q_type: Option<String>,
    #[serde(default)]
    pub set_index: Option<Value>,
    #[serde(default)]
    pub seconds: Option<Value>,
    #[serde(default, deserialize_with = "lenient::opt")]
    pub total: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt")]
    pub correct: Option<u64>,
    #[serde(default)]
    pub accuracy: Option<Value>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub answered: Option<Vec<AnswerRecord>>,
}

impl SessionRecord {
    pub fn user(&self) -> &str {
        lenient::first_non_empty([self.user.as_deref()]).unwrap_or(GUEST_USER)
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        self.answered.as_deref().unwrap_or_default()
    }

    /// Answer list length, else the declared total.
    pub fn answered_count(&self) -> u64 {
        match &self.answered {
            Some(answers) => answers.len() as u64,
            None => self.total.unwrap_or(0),
        }
    }

    /// Declared total, else the answer list length.
    pub fn declared_total(&self) -> u64 {
        self.total.unwrap_or(self.answers().len() as u64)
    }

    /// Declared correct count, else the number of correct answers.
    pub fn correct_count(&self) -> u64 {
        self.correct
            .unwrap_or_else(|| self.answers().iter().filter(|a| a.correct).count() as u64)
    }

    /// Declared correct count unless it is zero, else the number of correct
    /// answers. The per-user listing counts a declared `0` this way.
    pub fn listed_correct_count(&self) -> u64 {
        match self.correct {
            Some(declared) if declared > 0 => declared,
            _ => self.answers().iter().filter(|a| a.correct).count() as u64,
        }
    }

    /// Elapsed seconds as submitted, 0 when absent.
    pub fn seconds(&self) -> Value {
        self.seconds.clone().unwrap_or_else(|| Value::from(0))
    }

    pub fn last_at(&self) -> &str {
        lenient::first_non_empty([self.ended_at.as_deref(), self.received_at.as_deref()])
            .unwrap_or("")
    }

    pub fn mode(&self) -> &str {
        lenient::first_non_empty([self.mode.as_deref()]).unwrap_or(DEFAULT_MODE)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub unit: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient::string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::truthy")]
    pub correct: bool,
    #[serde(default)]
    pub user_answer: Option<Value>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub at: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub jp: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub en: Option<String>,
}

impl AnswerRecord {
    /// Answer timestamp, else the session's end, else its receipt time.
    pub fn at<'a>(&'a self, session: &'a SessionRecord) -> Option<&'a str> {
        lenient::first_non_empty([
            self.at.as_deref(),
            session.ended_at.as_deref(),
            session.received_at.as_deref(),
        ])
    }

    pub fn unit(&self, question: Option<&Question>) -> String {
        lenient::first_non_empty([
            self.unit.as_deref(),
            question.and_then(|q| q.unit.as_deref()),
        ])
        .unwrap_or("")
        .to_string()
    }

    pub fn kind(&self, question: Option<&Question>) -> String {
        lenient::first_non_empty([self.kind.as_deref(), question.map(|q| q.kind.as_str())])
            .unwrap_or("")
            .to_string()
    }

    pub fn jp(&self, question: Option<&Question>) -> Option<String> {
        lenient::first_non_empty([question.and_then(|q| q.jp.as_deref()), self.jp.as_deref()])
            .map(str::to_string)
    }

    pub fn en(&self, question: Option<&Question>) -> Option<String> {
        lenient::first_non_empty([question.and_then(|q| q.en.as_deref()), self.en.as_deref()])
            .map(str::to_string)
    }
}

/// Which sessions a summary covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSelector {
    All,
    Only(String),
}

impl UserSelector {
    pub const ALL_TOKEN: &'static str = "__all__";

    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            None | Some("") | Some(Self::ALL_TOKEN) => UserSelector::All,
            Some(user) => UserSelector::Only(user.to_string()),
        }
    }

    pub fn matches(&self, session: &SessionRecord) -> bool {
        match self {
            UserSelector::All => true,
            UserSelector::Only(user) => session.user() == user,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryFilter {
    pub user: UserSelector,
    /// Exact unit label; empty means no filter
    pub unit: String,
    /// Case-insensitive search text; empty means no filter
    pub query: String,
}

impl Default for SummaryFilter {
    fn default() -> Self {
        Self {
            user: UserSelector::All,
            unit: String::new(),
            query: String::new(),
        }
    }
}

/// Query string of `/api/admin/summary`
#[derive(Debug, Default)]
pub struct SummaryParams {
    pub user: Option<String>,
    pub unit: Option<String>,
    pub q: Option<String>,
}

impl SummaryParams {
    /// First occurrence of each known key wins; unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "user" => &mut params.user,
                "unit" => &mut params.unit,
                "q" => &mut params.q,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

impl From<SummaryParams> for SummaryFilter {
    fn from(params: SummaryParams) -> Self {
        Self {
            user: UserSelector::from_param(params.user.as_deref()),
            unit: params.unit.unwrap_or_default(),
            query: params.q.unwrap_or_default().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user: String,
    pub sessions: u64,
    pub last_at: String,
    pub answered: u64,
    pub correct: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    pub user: String,
    pub ended_at: Option<String>,
    pub total: u64,
    pub correct: u64,
    pub accuracy: Option<Value>,
    pub mode: String,
    pub q_type: Option<String>,
    pub set_index: Option<Value>,
    pub seconds: Value,
}

/// One answer, flattened and resolved against the catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRow {
    pub user: String,
    pub id: Option<String>,
    pub unit: String,
    pub jp: Option<String>,
    pub en: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub correct: bool,
    pub user_answer: Option<Value>,
    pub at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub sessions: u64,
    pub answered: u64,
    pub correct: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitRow {
    pub unit: String,
    pub answered: u64,
    pub correct: u64,
    pub wrong: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissedRow {
    pub id: String,
    pub unit: String,
    pub jp: Option<String>,
    pub en: Option<String>,
    pub answered: u64,
    pub wrong: u64,
    pub last_at: String,
}

/// Admin dashboard payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub totals: Totals,
    pub by_unit: Vec<UnitRow>,
    pub top_missed: Vec<MissedRow>,
    pub recent_answers: Vec<AnswerRow>,
    pub sessions: Vec<SessionRow>,
}
