use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::dialogue::{replies, DialogueRouter, Inbound};
use crate::handlers::utils::{main_menu_keyboard, send_reply};
use crate::handlers::HandlerResult;
use crate::models::MenuCommand;

use crate::Command;

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    router: DialogueRouter,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    match cmd {
        Command::Start => handle_start(&bot, &msg, user.id, &router).await?,
        Command::Help => handle_help(&bot, &msg).await?,
        Command::Cancel => handle_cancel(&bot, &msg, user.id, &router).await?,
        other => {
            let Some(menu_cmd) = menu_command(&other) else {
                return Ok(());
            };
            let reply = router.route(user.id, Inbound::Command(menu_cmd), msg.date).await;
            send_reply(&bot, msg.chat.id, reply).await?;
        }
    }
    Ok(())
}

fn menu_command(cmd: &Command) -> Option<MenuCommand> {
    let menu_cmd = match cmd {
        Command::Add => MenuCommand::AddSession,
        Command::Finish => MenuCommand::Finish,
        Command::Goal => MenuCommand::SetGoal,
        Command::Plan => MenuCommand::ScheduleNext,
        Command::Sport => MenuCommand::SetSport,
        Command::Reset => MenuCommand::Reset,
        Command::Status => MenuCommand::ShowStatus,
        Command::Start | Command::Help | Command::Cancel => return None,
    };
    Some(menu_cmd)
}

async fn handle_start(
    bot: &Bot,
    msg: &Message,
    user_id: UserId,
    router: &DialogueRouter,
) -> HandlerResult {
    router.cancel(user_id).await;
    log::info!("User {} started the bot", user_id);

    bot.send_message(msg.chat.id, replies::greeting())
        .reply_markup(main_menu_keyboard())
        .await?;

    Ok(())
}

async fn handle_help(bot: &Bot, msg: &Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .reply_markup(main_menu_keyboard())
        .await?;

    Ok(())
}

async fn handle_cancel(
    bot: &Bot,
    msg: &Message,
    user_id: UserId,
    router: &DialogueRouter,
) -> HandlerResult {
    let abandoned = router.cancel(user_id).await;
    log::debug!("User {} cancelled {:?}", user_id, abandoned);

    bot.send_message(msg.chat.id, replies::cancelled())
        .reply_markup(main_menu_keyboard())
        .await?;

    Ok(())
}
