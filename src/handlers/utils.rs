use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup};

use crate::dialogue::{Menu, Reply};
use crate::models::MenuCommand;

/// Main menu, two buttons per row.
pub fn main_menu_keyboard() -> ReplyMarkup {
    let rows = MenuCommand::ALL
        .chunks(2)
        .map(|row| row.iter().map(|cmd| KeyboardButton::new(cmd.label())).collect())
        .collect::<Vec<Vec<KeyboardButton>>>();

    ReplyMarkup::Keyboard(KeyboardMarkup::new(rows).resize_keyboard())
}

/// Inline shortcuts shown under status messages.
pub fn quick_actions_keyboard() -> InlineKeyboardMarkup {
    let button = |cmd: MenuCommand| InlineKeyboardButton::callback(cmd.label(), cmd.payload());

    InlineKeyboardMarkup::new(vec![
        vec![button(MenuCommand::AddSession), button(MenuCommand::ScheduleNext)],
        vec![button(MenuCommand::SetGoal), button(MenuCommand::SetSport)],
    ])
}

pub async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> Result<(), teloxide::RequestError> {
    let request = bot.send_message(chat_id, reply.text);

    match reply.menu {
        Some(Menu::Main) => request.reply_markup(main_menu_keyboard()).await?,
        Some(Menu::QuickActions) => request.reply_markup(quick_actions_keyboard()).await?,
        None => request.await?,
    };

    Ok(())
}
