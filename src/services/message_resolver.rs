//! Template variable resolution for interstitial text.
//!
//! Authored titles and messages may carry `[[…]]` placeholders in three
//! families: scalar metrics, positional references to one poll and the
//! identity's votes on it, and random call-backs to earlier answers.
//! Resolution is soft: anything unresolvable stays verbatim in the output
//! so a misconfigured template degrades instead of breaking the render.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use regex::Regex;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{HistoryEntry, MetricsSnapshot, Poll, PollKind, Side, Vote};
use crate::domain::ports::{ConfigRepository, PollRepository, ProgressStore};
use crate::services::metrics::MetricsService;

const NOT_ANSWERED: &str = "[Not Answered]";
const FALLBACK_TITLE: &str = "one of the scenarios";
const FALLBACK_ANSWER: &str = "your earlier answer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PositionalKey {
    stage: u32,
    level: u32,
    ordinal: u32,
}

#[derive(Debug, Clone, Copy)]
enum ScalarField {
    PointTotal,
    Awareness,
    Deviance,
    LevelPoints,
    LevelDeviance,
}

#[derive(Debug, Clone, Copy)]
enum PositionalField {
    Question,
    Answer,
    Points,
    Feedback,
}

#[derive(Debug, Clone, Copy)]
enum RandomField {
    CorrectTitle,
    IncorrectTitle,
    CorrectAnswer,
    IncorrectAnswer,
}

#[derive(Debug, Clone, Copy)]
enum Token {
    Scalar(ScalarField),
    Positional(PositionalField, PositionalKey),
    Random(RandomField),
}

/// Resolves placeholders against one identity's metrics and vote history.
pub struct MessageResolver<P: PollRepository, C: ConfigRepository> {
    polls: Arc<P>,
    metrics: MetricsService<C>,
    placeholder: Regex,
    positional: Regex,
}

impl<P: PollRepository, C: ConfigRepository> MessageResolver<P, C> {
    pub fn new(polls: Arc<P>, metrics: MetricsService<C>) -> Self {
        Self {
            polls,
            metrics,
            placeholder: Regex::new(r"\[\[([A-Za-z0-9-]+)\]\]").unwrap(),
            positional: Regex::new(r"^([QAPF])-S(\d+)-L(\d+)-P(\d+)$").unwrap(),
        }
    }

    /// Resolve every known placeholder in `text`. Unknown names, missing
    /// polls and malformed coordinates stay verbatim.
    #[instrument(skip(self, store, text), fields(identity = %store.identity()))]
    pub async fn resolve(&self, store: &dyn ProgressStore, text: &str) -> DomainResult<String> {
        if !text.contains("[[") {
            return Ok(text.to_string());
        }

        let mut tokens: HashMap<String, Token> = HashMap::new();
        for caps in self.placeholder.captures_iter(text) {
            let name = caps[1].to_string();
            if !tokens.contains_key(&name) {
                if let Some(token) = self.classify(&name) {
                    tokens.insert(name, token);
                }
            }
        }

        let mut values: HashMap<String, String> = HashMap::new();

        if tokens.values().any(|t| matches!(t, Token::Scalar(_))) {
            let snapshot = self.metrics.snapshot(store).await?;
            for (name, token) in &tokens {
                if let Token::Scalar(field) = token {
                    values.insert(name.clone(), scalar_value(*field, &snapshot));
                }
            }
        }

        // Several placeholders may address the same poll; fetch each unique
        // coordinate exactly once.
        let mut contexts: HashMap<PositionalKey, (Option<Poll>, Vec<Vote>)> = HashMap::new();
        for token in tokens.values() {
            if let Token::Positional(_, key) = token {
                if !contexts.contains_key(key) {
                    let poll = self
                        .polls
                        .get_by_position(key.stage, key.level, key.ordinal)
                        .await?;
                    let rows = store.rows_at(key.stage, key.level, key.ordinal).await?;
                    contexts.insert(*key, (poll, rows));
                }
            }
        }
        for (name, token) in &tokens {
            if let Token::Positional(field, key) = token {
                match &contexts[key] {
                    (Some(poll), rows) => {
                        values.insert(name.clone(), positional_value(*field, poll, rows));
                    }
                    (None, _) => {
                        debug!(name, "no poll at placeholder position");
                    }
                }
            }
        }

        if tokens.values().any(|t| matches!(t, Token::Random(_))) {
            let position = store.position().await?;
            let history = store.level_history(position.stage, position.level).await?;
            for (name, token) in &tokens {
                if let Token::Random(field) = token {
                    let value = self.random_value(*field, &history).await?;
                    values.insert(name.clone(), value);
                }
            }
        }

        Ok(self.substitute(text, &values))
    }

    fn classify(&self, name: &str) -> Option<Token> {
        let token = match name {
            "PointTotal" => Token::Scalar(ScalarField::PointTotal),
            "AwarenessQuotient" => Token::Scalar(ScalarField::Awareness),
            "DevianceQuotient" => Token::Scalar(ScalarField::Deviance),
            "LevelPoints" => Token::Scalar(ScalarField::LevelPoints),
            "LevelDeviance" => Token::Scalar(ScalarField::LevelDeviance),
            "RandomCorrectTitle" => Token::Random(RandomField::CorrectTitle),
            "RandomIncorrectTitle" => Token::Random(RandomField::IncorrectTitle),
            "RandomCorrectAnswer" => Token::Random(RandomField::CorrectAnswer),
            "RandomIncorrectAnswer" => Token::Random(RandomField::IncorrectAnswer),
            _ => {
                let caps = self.positional.captures(name)?;
                let field = match &caps[1] {
                    "Q" => PositionalField::Question,
                    "A" => PositionalField::Answer,
                    "P" => PositionalField::Points,
                    _ => PositionalField::Feedback,
                };
                let key = PositionalKey {
                    stage: caps[2].parse().ok()?,
                    level: caps[3].parse().ok()?,
                    ordinal: caps[4].parse().ok()?,
                };
                Token::Positional(field, key)
            }
        };
        Some(token)
    }

    /// Sample one earlier answer matching the wanted correctness within the
    /// current level. An empty pool resolves to a generic phrase.
    async fn random_value(
        &self,
        field: RandomField,
        entries: &[HistoryEntry],
    ) -> DomainResult<String> {
        let want_correct = matches!(
            field,
            RandomField::CorrectTitle | RandomField::CorrectAnswer
        );
        let mut per_poll: HashMap<Uuid, &HistoryEntry> = HashMap::new();
        for entry in entries.iter().filter(|e| e.vote.correct == want_correct) {
            per_poll.entry(entry.vote.poll_id).or_insert(entry);
        }
        let pool: Vec<&HistoryEntry> = per_poll.into_values().collect();
        if pool.is_empty() {
            return Ok(fallback(field).to_string());
        }

        let pick = pool[rand::thread_rng().gen_range(0..pool.len())];
        let Some(poll) = self.polls.get(pick.vote.poll_id).await? else {
            return Ok(fallback(field).to_string());
        };
        let value = match field {
            RandomField::CorrectTitle | RandomField::IncorrectTitle => {
                poll.question_text().to_string()
            }
            RandomField::CorrectAnswer | RandomField::IncorrectAnswer => poll
                .option(pick.vote.option_id)
                .map_or_else(|| fallback(field).to_string(), |o| o.content.clone()),
        };
        Ok(value)
    }

    fn substitute(&self, text: &str, values: &HashMap<String, String>) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in self.placeholder.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&text[last..whole.start()]);
            match values.get(&caps[1]) {
                Some(value) => out.push_str(value),
                None => out.push_str(whole.as_str()),
            }
            last = whole.end();
        }
        out.push_str(&text[last..]);
        out
    }
}

fn fallback(field: RandomField) -> &'static str {
    match field {
        RandomField::CorrectTitle | RandomField::IncorrectTitle => FALLBACK_TITLE,
        RandomField::CorrectAnswer | RandomField::IncorrectAnswer => FALLBACK_ANSWER,
    }
}

fn scalar_value(field: ScalarField, snapshot: &MetricsSnapshot) -> String {
    match field {
        ScalarField::PointTotal => snapshot.raw_score.to_string(),
        ScalarField::Awareness => snapshot.awareness.to_string(),
        ScalarField::Deviance => percent(snapshot.deviance),
        ScalarField::LevelPoints => snapshot.level_points.to_string(),
        ScalarField::LevelDeviance => percent(snapshot.level_deviance),
    }
}

/// Deviance quotients render as whole percentages.
fn percent(quotient: f64) -> String {
    format!("{}", (quotient * 100.0).round() as i64)
}

fn positional_value(field: PositionalField, poll: &Poll, rows: &[Vote]) -> String {
    match field {
        PositionalField::Question => poll.question_text().to_string(),
        PositionalField::Points => rows
            .iter()
            .map(|r| r.points_earned)
            .sum::<i64>()
            .to_string(),
        PositionalField::Answer => {
            if rows.is_empty() {
                return NOT_ANSWERED.to_string();
            }
            match poll.kind {
                PollKind::QuadGrouping => quad_summary(poll, rows),
                PollKind::BinaryPlacement => binary_summary(poll, rows),
                _ => rows
                    .first()
                    .and_then(|r| poll.option(r.option_id))
                    .map_or_else(|| NOT_ANSWERED.to_string(), |o| o.content.clone()),
            }
        }
        PositionalField::Feedback => {
            if rows.is_empty() {
                return String::new();
            }
            feedback_text(poll, rows)
        }
    }
}

/// Two-column rendering of a quad grouping: the pair holding option 1 on
/// the left, the other pair on the right.
fn quad_summary(poll: &Poll, rows: &[Vote]) -> String {
    let mut sorted: Vec<&Vote> = rows.iter().collect();
    sorted.sort_by_key(|r| r.slot);

    let mut left: Vec<&str> = Vec::new();
    let mut right: Vec<&str> = Vec::new();
    for row in sorted {
        let Some(option) = poll.option(row.option_id) else { continue };
        match row.side {
            Some(Side::Left) => left.push(option.content.as_str()),
            _ => right.push(option.content.as_str()),
        }
    }
    format!("{} / {}", left.join(" + "), right.join(" + "))
}

fn binary_summary(poll: &Poll, rows: &[Vote]) -> String {
    let row = &rows[0];
    let (Some(side), Some(first)) = (row.side, poll.option(row.option_id)) else {
        return NOT_ANSWERED.to_string();
    };
    let Some(second) = poll.options.iter().find(|o| o.id != first.id) else {
        return first.content.clone();
    };
    format!(
        "{} on the {}, {} on the {}",
        first.content,
        side.as_str(),
        second.content,
        side.opposite().as_str()
    )
}

fn feedback_text(poll: &Poll, rows: &[Vote]) -> String {
    if poll.kind == PollKind::QuadGrouping {
        if let Some(text) = quad_pairing_feedback(poll, rows) {
            return text;
        }
    }
    if poll.kind == PollKind::MultiChoice {
        if let Some(text) = rows
            .first()
            .and_then(|r| poll.option(r.option_id))
            .and_then(|o| o.feedback.clone())
        {
            return text;
        }
    }
    let correct = rows.iter().all(|r| r.correct);
    if correct {
        poll.feedback_correct.clone()
    } else {
        poll.feedback_incorrect.clone()
    }
}

/// Pairing-specific feedback: find which option shares a group with option
/// 1 and look it up in the anchor's pairing table.
fn quad_pairing_feedback(poll: &Poll, rows: &[Vote]) -> Option<String> {
    let anchor_row = rows.iter().find(|r| r.slot == 1)?;
    let partner_row = rows
        .iter()
        .find(|r| r.slot != 1 && r.side == anchor_row.side)?;
    let anchor = poll.option_by_ordinal(1)?;
    anchor
        .pairing
        .as_ref()?
        .entry_for(partner_row.slot)?
        .feedback
        .clone()
}
