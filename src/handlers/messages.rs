use teloxide::prelude::*;

use crate::dialogue::{DialogueRouter, Inbound};
use crate::handlers::utils::send_reply;
use crate::handlers::HandlerResult;

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    router: DialogueRouter,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    // Non-text messages (stickers, photos) are routed as empty text.
    let text = msg.text().unwrap_or_default();
    let reply = router.route(user.id, Inbound::Text(text), msg.date).await;

    log::debug!("User {} -> {:?}", user.id, reply.state);
    send_reply(&bot, msg.chat.id, reply).await?;

    Ok(())
}
