use teloxide::{prelude::*, utils::command::BotCommands};

mod config;
mod database;
mod dialogue;
mod handlers;
mod models;

use crate::config::Config;
use crate::database::ProfileStore;
use crate::dialogue::DialogueRouter;
use crate::handlers::{callback_handler, command_handler, message_handler};

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "show the menu")]
    Start,
    #[command(description = "show this help")]
    Help,
    #[command(description = "log a completed session")]
    Add,
    #[command(description = "finish and show progress")]
    Finish,
    #[command(description = "set the monthly goal")]
    Goal,
    #[command(description = "schedule the next session")]
    Plan,
    #[command(description = "set your sport")]
    Sport,
    #[command(description = "show progress")]
    Status,
    #[command(description = "reset all progress")]
    Reset,
    #[command(description = "cancel the current step")]
    Cancel,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Starting training tracker bot...");

    let config = Config::from_env()?;

    let store = ProfileStore::new(&config.store_path)
        .with_timeout(config.store_timeout)
        .with_retries(config.store_retries);

    // A corrupt document is left for an operator to repair; until then every
    // request is answered as "temporarily unavailable".
    match store.init().await {
        Ok(count) => log::info!("✅ Profile store {} ready, {} profiles", store.path().display(), count),
        Err(e) => log::error!("❌ Profile store {} is not usable: {}", store.path().display(), e),
    }

    let router = DialogueRouter::new(store);

    let router_clone = router.clone();
    tokio::spawn(handlers::cursor_cleanup_task(
        router_clone,
        config.cursor_ttl,
        config.cursor_sweep,
    ));

    let bot = Bot::new(config.bot_token.clone());

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Could not register bot commands: {}", e);
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler))
        .branch(Update::filter_message().endpoint(message_handler));

    log::info!("🚀 Starting dispatcher...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
