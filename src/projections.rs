use serde_json::Value;
use std::collections::HashMap;

use crate::models::{
    AnswerRow, Catalog, MissedRow, SessionRecord, SessionRow, Summary, SummaryFilter, Totals,
    UnitRow, UserSummary,
};

/// Rows kept in `recentAnswers` and `sessions`
pub const RECENT_LIMIT: usize = 100;
pub const NO_ID: &str = "(no-id)";

/// Per-user activity, most recently active first.
pub fn user_summaries(sessions: &[SessionRecord]) -> Vec<UserSummary> {
    let mut users: Vec<UserSummary> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for session in sessions {
        let user = session.user();
        let slot = *index.entry(user).or_insert_with(|| {
            users.push(UserSummary {
                user: user.to_string(),
                sessions: 0,
                last_at: String::new(),
                answered: 0,
                correct: 0,
            });
            users.len() - 1
        });

        let summary = &mut users[slot];
        summary.sessions += 1;
        summary.answered += session.answered_count();
        summary.correct += session.listed_correct_count();
        if session.last_at() > summary.last_at.as_str() {
            summary.last_at = session.last_at().to_string();
        }
    }

    users.sort_by(|a, b| b.last_at.cmp(&a.last_at));
    users
}

/// Dashboard summary for the sessions and answers selected by `filter`.
pub fn summarize(sessions: &[SessionRecord], catalog: &Catalog, filter: &SummaryFilter) -> Summary {
    let mut session_rows = Vec::new();
    let mut answers = Vec::new();

    for session in sessions.iter().filter(|s| filter.user.matches(s)) {
        session_rows.push(session_row(session));

        for answer in session.answers() {
            let question = answer.id.as_deref().and_then(|id| catalog.get(id));
            let row = AnswerRow {
                user: session.user().to_string(),
                id: answer.id.clone(),
                unit: answer.unit(question),
                jp: answer.jp(question),
                en: answer.en(question),
                kind: answer.kind(question),
                correct: answer.correct,
                user_answer: answer.user_answer.clone(),
                at: answer.at(session).map(str::to_string),
            };
            if matches_filter(&row, filter) {
                answers.push(row);
            }
        }
    }

    let totals = Totals {
        sessions: session_rows.len() as u64,
        answered: answers.len() as u64,
        correct: answers.iter().filter(|a| a.correct).count() as u64,
    };
    let by_unit = by_unit(&answers);
    let top_missed = top_missed(&answers);

    answers.sort_by(|a, b| timestamp_key(&b.at).cmp(timestamp_key(&a.at)));
    answers.truncate(RECENT_LIMIT);

    session_rows.sort_by(|a, b| timestamp_key(&b.ended_at).cmp(timestamp_key(&a.ended_at)));
    session_rows.truncate(RECENT_LIMIT);

    Summary {
        totals,
        by_unit,
        top_missed,
        recent_answers: answers,
        sessions: session_rows,
    }
}

fn session_row(session: &SessionRecord) -> SessionRow {
    SessionRow {
        user: session.user().to_string(),
        ended_at: session.ended_at.clone(),
        total: session.declared_total(),
        correct: session.correct_count(),
        accuracy: session.accuracy.clone(),
        mode: session.mode().to_string(),
        q_type: session.q_type.clone(),
        set_index: session.set_index.clone(),
        seconds: session.seconds(),
    }
}

fn matches_filter(row: &AnswerRow, filter: &SummaryFilter) -> bool {
    if !filter.unit.is_empty() && row.unit != filter.unit {
        return false;
    }
    if filter.query.is_empty() {
        return true;
    }
    search_text(row).contains(&filter.query)
}

/// Lowercased `id jp en userAnswer`
fn search_text(row: &AnswerRow) -> String {
    let user_answer = match &row.user_answer {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    [
        row.id.as_deref().unwrap_or(""),
        row.jp.as_deref().unwrap_or(""),
        row.en.as_deref().unwrap_or(""),
        user_answer.as_str(),
    ]
    .join(" ")
    .to_lowercase()
}

fn timestamp_key(at: &Option<String>) -> &str {
    at.as_deref().unwrap_or("")
}

fn by_unit(answers: &[AnswerRow]) -> Vec<UnitRow> {
    let mut units: HashMap<&str, UnitRow> = HashMap::new();
    for answer in answers {
        let row = units.entry(answer.unit.as_str()).or_insert_with(|| UnitRow {
            unit: answer.unit.clone(),
            answered: 0,
            correct: 0,
            wrong: 0,
        });
        row.answered += 1;
        if answer.correct {
            row.correct += 1;
        } else {
            row.wrong += 1;
        }
    }

    let mut rows: Vec<UnitRow> = units.into_values().collect();
    rows.sort_by(|a, b| b.answered.cmp(&a.answered).then_with(|| a.unit.cmp(&b.unit)));
    rows
}

/// Most-missed questions: wrong count desc, then answered desc.
fn top_missed(answers: &[AnswerRow]) -> Vec<MissedRow> {
    let mut rows: Vec<MissedRow> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for answer in answers {
        let id = answer.id.as_deref().filter(|id| !id.is_empty()).unwrap_or(NO_ID);
        let slot = *index.entry(id).or_insert_with(|| {
            rows.push(MissedRow {
                id: id.to_string(),
                unit: answer.unit.clone(),
                jp: answer.jp.clone(),
                en: answer.en.clone(),
                answered: 0,
                wrong: 0,
                last_at: String::new(),
            });
            rows.len() - 1
        });

        let row = &mut rows[slot];
        row.answered += 1;
        if !answer.correct {
            row.wrong += 1;
        }
        let at = timestamp_key(&answer.at);
        if at > row.last_at.as_str() {
            row.last_at = at.to_string();
        }
    }

    rows.sort_by(|a, b| (b.wrong, b.answered).cmp(&(a.wrong, a.answered)));
    rows
}
