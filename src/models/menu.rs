/// Commands offered to the user as buttons and slash commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuCommand {
    AddSession,
    Finish,
    SetGoal,
    ScheduleNext,
    SetSport,
    Reset,
    ShowStatus,
}

impl MenuCommand {
    pub const ALL: [MenuCommand; 7] = [
        MenuCommand::AddSession,
        MenuCommand::Finish,
        MenuCommand::SetGoal,
        MenuCommand::ScheduleNext,
        MenuCommand::SetSport,
        MenuCommand::Reset,
        MenuCommand::ShowStatus,
    ];

    /// Reply keyboard button text.
    pub fn label(self) -> &'static str {
        match self {
            MenuCommand::AddSession => "➕ Add session",
            MenuCommand::Finish => "✅ Finish",
            MenuCommand::SetGoal => "🎯 Goal",
            MenuCommand::ScheduleNext => "📅 Plan",
            MenuCommand::SetSport => "⚙️ Sport",
            MenuCommand::Reset => "🔁 Reset",
            MenuCommand::ShowStatus => "📊 Status",
        }
    }

    /// Inline keyboard callback data.
    pub fn payload(self) -> &'static str {
        match self {
            MenuCommand::AddSession => "add_session",
            MenuCommand::Finish => "finish",
            MenuCommand::SetGoal => "set_goal",
            MenuCommand::ScheduleNext => "schedule_next",
            MenuCommand::SetSport => "set_sport",
            MenuCommand::Reset => "reset",
            MenuCommand::ShowStatus => "show_status",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            MenuCommand::AddSession => &["add session", "add"],
            MenuCommand::Finish => &["finish", "done"],
            MenuCommand::SetGoal => &["set goal", "goal"],
            MenuCommand::ScheduleNext => &["schedule next", "plan"],
            MenuCommand::SetSport => &["set sport", "sport"],
            MenuCommand::Reset => &["reset"],
            MenuCommand::ShowStatus => &["show status", "status"],
        }
    }

    pub fn from_payload(data: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.payload() == data)
    }

    /// Matches a button label, a callback payload or a plain-word alias.
    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(cmd) = Self::ALL.into_iter().find(|cmd| cmd.label() == text) {
            return Some(cmd);
        }
        let lowered = text.to_lowercase();
        Self::ALL.into_iter().find(|cmd| {
            cmd.payload() == lowered || cmd.aliases().contains(&lowered.as_str())
        })
    }
}
