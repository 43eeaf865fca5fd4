use std::fmt;

/// Field collected by a multi-step dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Goal,
    Comment,
    NextDate,
    Sport,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Goal => "goal",
            Field::Comment => "comment",
            Field::NextDate => "next session",
            Field::Sport => "sport",
        };
        f.write_str(name)
    }
}

/// Where a user currently is in the conversation. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DialogueState {
    #[default]
    Idle,
    AwaitingGoal,
    AwaitingComment,
    AwaitingNextDate,
    AwaitingSport,
}

impl DialogueState {
    pub fn awaiting(field: Field) -> Self {
        match field {
            Field::Goal => DialogueState::AwaitingGoal,
            Field::Comment => DialogueState::AwaitingComment,
            Field::NextDate => DialogueState::AwaitingNextDate,
            Field::Sport => DialogueState::AwaitingSport,
        }
    }

    pub fn field(self) -> Option<Field> {
        match self {
            DialogueState::Idle => None,
            DialogueState::AwaitingGoal => Some(Field::Goal),
            DialogueState::AwaitingComment => Some(Field::Comment),
            DialogueState::AwaitingNextDate => Some(Field::NextDate),
            DialogueState::AwaitingSport => Some(Field::Sport),
        }
    }

    pub fn is_idle(self) -> bool {
        self == DialogueState::Idle
    }
}
