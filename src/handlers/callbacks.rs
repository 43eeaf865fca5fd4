use chrono::Utc;
use teloxide::prelude::*;

use crate::dialogue::{DialogueRouter, Inbound};
use crate::handlers::utils::send_reply;
use crate::handlers::HandlerResult;
use crate::models::MenuCommand;

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    router: DialogueRouter,
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(cmd) = q.data.as_deref().and_then(MenuCommand::from_payload) else {
        log::warn!("Unknown callback data from user {}: {:?}", q.from.id, q.data);
        return Ok(());
    };

    let reply = router.route(q.from.id, Inbound::Command(cmd), Utc::now()).await;
    send_reply(&bot, ChatId::from(q.from.id), reply).await?;

    Ok(())
}
