//! Pure dialogue transitions: `(state, input) -> (effect, next state)`.
//!
//! Nothing here touches the store or the transport, so every rule can be
//! checked on its own.

use chrono::{DateTime, Utc};

use crate::models::{DialogueState, Field, MenuCommand, ProfilePatch};

pub const MAX_TEXT_LEN: usize = 256;
pub const MAX_COMMENT_LEN: usize = 1024;

/// What arrived from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// Free text. While a field is awaited this is the field value.
    Text(&'a str),
    /// Explicit command (slash command or inline button). Always dispatched
    /// as from `Idle`.
    Command(MenuCommand),
}

/// Work the router performs for a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Prompt(Field),
    Update(ProfilePatch),
    LogSession { at: DateTime<Utc> },
    ShowStatus,
    Finish,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub effect: Effect,
    pub next: DialogueState,
}

impl Transition {
    fn new(effect: Effect, next: DialogueState) -> Self {
        Self { effect, next }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DialogueError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: Field, reason: &'static str },
    #[error("unknown command")]
    UnknownCommand,
}

pub fn transition(
    state: DialogueState,
    input: Inbound<'_>,
    at: DateTime<Utc>,
) -> Result<Transition, DialogueError> {
    match (state.field(), input) {
        (_, Inbound::Command(cmd)) => Ok(start(cmd, at)),
        (None, Inbound::Text(text)) => MenuCommand::from_text(text)
            .map(|cmd| start(cmd, at))
            .ok_or(DialogueError::UnknownCommand),
        (Some(field), Inbound::Text(text)) => {
            let patch = parse_field(field, text)?;
            Ok(Transition::new(Effect::Update(patch), DialogueState::Idle))
        }
    }
}

fn start(cmd: MenuCommand, at: DateTime<Utc>) -> Transition {
    match cmd {
        MenuCommand::AddSession => {
            Transition::new(Effect::LogSession { at }, DialogueState::AwaitingComment)
        }
        MenuCommand::Finish => Transition::new(Effect::Finish, DialogueState::Idle),
        MenuCommand::SetGoal => prompt(Field::Goal),
        MenuCommand::ScheduleNext => prompt(Field::NextDate),
        MenuCommand::SetSport => prompt(Field::Sport),
        MenuCommand::Reset => Transition::new(Effect::Reset, DialogueState::Idle),
        MenuCommand::ShowStatus => Transition::new(Effect::ShowStatus, DialogueState::Idle),
    }
}

fn prompt(field: Field) -> Transition {
    Transition::new(Effect::Prompt(field), DialogueState::awaiting(field))
}

pub fn parse_field(field: Field, text: &str) -> Result<ProfilePatch, DialogueError> {
    let value = text.trim();
    match field {
        Field::Goal => value
            .parse::<u32>()
            .map(ProfilePatch::goal)
            .map_err(|_| DialogueError::Invalid { field, reason: "expected a whole number" }),
        Field::Comment => text_value(field, value, MAX_COMMENT_LEN).map(ProfilePatch::comment),
        Field::NextDate => text_value(field, value, MAX_TEXT_LEN).map(ProfilePatch::next),
        Field::Sport => text_value(field, value, MAX_TEXT_LEN).map(ProfilePatch::sport),
    }
}

fn text_value(field: Field, value: &str, max: usize) -> Result<String, DialogueError> {
    if value.is_empty() {
        Err(DialogueError::Invalid { field, reason: "text is empty" })
    } else if value.chars().count() > max {
        Err(DialogueError::Invalid { field, reason: "text is too long" })
    } else {
        Ok(value.to_string())
    }
}
