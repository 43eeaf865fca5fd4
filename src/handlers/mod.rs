pub mod callbacks;
pub mod commands;
pub mod messages;
pub mod utils;

pub use callbacks::callback_handler;
pub use commands::command_handler;
pub use messages::message_handler;

use std::time::Duration;
use tokio::time;

use crate::dialogue::DialogueRouter;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Periodically forgets dialogue cursors nobody has touched for `ttl`.
pub async fn cursor_cleanup_task(router: DialogueRouter, ttl: Duration, every: Duration) {
    let mut interval = time::interval(every);

    loop {
        interval.tick().await;

        let removed = router.cleanup_cursors(ttl).await;
        if removed > 0 {
            log::info!("Expired {} stale dialogue cursor(s)", removed);
        }
    }
}
