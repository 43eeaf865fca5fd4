use crate::models::{Field, LastSession, Profile};

pub fn greeting() -> String {
    "👋 Hi! I keep track of your training goal, sessions and plans.\n\
     Use the menu below."
        .to_string()
}

pub fn help() -> String {
    "🤷 I didn't get that. Pick an action from the menu.".to_string()
}

pub fn prompt(field: Field) -> String {
    match field {
        Field::Goal => "🎯 How many sessions this month?",
        Field::Comment => "💬 Session logged. Add a comment:",
        Field::NextDate => "📅 When is the next session? (e.g. 20.06)",
        Field::Sport => "⚙️ Which sport?",
    }
    .to_string()
}

pub fn retry(field: Field, reason: &str) -> String {
    match field {
        Field::Goal => format!("⚠️ {}. Send the goal as a number, e.g. 12.", capitalize(reason)),
        _ => format!("⚠️ {}. Send the {} again.", capitalize(reason), field),
    }
}

pub fn saved(profile: &Profile) -> String {
    format!("✅ Saved\n{}", status(profile))
}

pub fn finished(profile: &Profile) -> String {
    format!("🏁 Done\n{}", status(profile))
}

pub fn session_logged(profile: &Profile) -> String {
    let award = if profile.done > 0 && profile.done % crate::models::profile::AWARD_EVERY == 0 {
        format!("🏆 New award! You have {} now.\n", profile.awards)
    } else {
        String::new()
    };
    format!("{}{}", award, prompt(Field::Comment))
}

pub fn reset() -> String {
    "🔁 Your progress has been reset.".to_string()
}

pub fn cancelled() -> String {
    "Cancelled.".to_string()
}

pub fn unavailable() -> String {
    "⏳ Storage is temporarily unavailable. Please try again later.".to_string()
}

pub fn status(profile: &Profile) -> String {
    let medal = if profile.goal_reached() { " 🏅" } else { "" };
    let last = profile
        .last
        .as_ref()
        .map(LastSession::display)
        .unwrap_or_else(|| "—".to_string());
    let comment = if profile.comment.is_empty() { "—" } else { profile.comment.as_str() };

    format!(
        "🎯 {}/{}{}\n🏆 {}\n📅 {}\n🏋️ {}\n🤸 {}\n💬 {}",
        profile.done, profile.goal, medal, profile.awards, profile.next, last, profile.sport, comment
    )
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
