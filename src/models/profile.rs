use serde::{Deserialize, Deserializer, Serialize};
use chrono::{DateTime, Utc};

/// One award is earned for every this many completed sessions.
pub const AWARD_EVERY: u32 = 5;

pub const SPORT_UNSET: &str = "unset";
pub const NEXT_UNSCHEDULED: &str = "unscheduled";

/// Persisted per-user tracking record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub goal: u32,
    #[serde(alias = "trainings")]
    pub done: u32,
    pub sport: String,
    pub next: String,
    #[serde(deserialize_with = "lenient_last")]
    pub last: Option<LastSession>,
    pub comment: String,
    pub awards: u32,
}

/// When the most recent session happened. Older stores keep it as
/// preformatted text such as `19.06 18:30`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LastSession {
    At(DateTime<Utc>),
    Text(String),
}

impl LastSession {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "—" {
            return None;
        }
        match DateTime::parse_from_rfc3339(raw) {
            Ok(at) => Some(LastSession::At(at.with_timezone(&Utc))),
            Err(_) => Some(LastSession::Text(raw.to_string())),
        }
    }

    pub fn display(&self) -> String {
        match self {
            LastSession::At(at) => at.format("%d.%m %H:%M").to_string(),
            LastSession::Text(text) => text.clone(),
        }
    }
}

fn lenient_last<'de, D>(deserializer: D) -> Result<Option<LastSession>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(LastSession::parse))
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            goal: 0,
            done: 0,
            sport: SPORT_UNSET.to_string(),
            next: NEXT_UNSCHEDULED.to_string(),
            last: None,
            comment: String::new(),
            awards: 0,
        }
    }
}

impl Profile {
    /// Adds completed sessions and re-derives `awards` from the new total.
    pub fn add_sessions(&mut self, amount: u32) {
        self.done = self.done.saturating_add(amount);
        self.derive_awards();
    }

    /// Awards always follow `done`, including for records stored without them.
    pub fn derive_awards(&mut self) {
        self.awards = self.done / AWARD_EVERY;
    }

    pub fn goal_reached(&self) -> bool {
        self.goal > 0 && self.done >= self.goal
    }

    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(goal) = patch.goal {
            self.goal = goal;
        }
        if let Some(sport) = &patch.sport {
            self.sport = sport.clone();
        }
        if let Some(next) = &patch.next {
            self.next = next.clone();
        }
        if let Some(last) = patch.last {
            self.last = Some(LastSession::At(last));
        }
        if let Some(comment) = &patch.comment {
            self.comment = comment.clone();
        }
        self.derive_awards();
    }
}

/// Partial update of the free-form fields. Counters are changed through
/// increments only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub goal: Option<u32>,
    pub sport: Option<String>,
    pub next: Option<String>,
    pub last: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}

impl ProfilePatch {
    pub fn goal(goal: u32) -> Self {
        Self { goal: Some(goal), ..Self::default() }
    }

    pub fn sport(sport: impl Into<String>) -> Self {
        Self { sport: Some(sport.into()), ..Self::default() }
    }

    pub fn next(next: impl Into<String>) -> Self {
        Self { next: Some(next.into()), ..Self::default() }
    }

    pub fn comment(comment: impl Into<String>) -> Self {
        Self { comment: Some(comment.into()), ..Self::default() }
    }

    pub fn last(at: DateTime<Utc>) -> Self {
        Self { last: Some(at), ..Self::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Completed sessions in the current period.
    Done,
}

impl Counter {
    pub fn add(self, profile: &mut Profile, amount: u32) {
        match self {
            Counter::Done => profile.add_sessions(amount),
        }
    }
}
