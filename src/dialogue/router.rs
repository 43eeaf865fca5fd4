use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use teloxide::types::UserId;
use tokio::sync::RwLock;

use crate::database::{ProfileStore, StoreError};
use crate::dialogue::replies;
use crate::dialogue::transition::{transition, DialogueError, Effect, Inbound};
use crate::models::{Counter, DialogueState, ProfilePatch};

type CursorTable = Arc<RwLock<HashMap<UserId, (DialogueState, SystemTime)>>>;

/// Menu the transport should attach to a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    /// Persistent reply keyboard with every menu command.
    Main,
    /// Inline buttons under a status message.
    QuickActions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub menu: Option<Menu>,
    pub state: DialogueState,
}

/// Routes each user's messages through their conversation cursor and applies
/// the resulting changes to the profile store.
#[derive(Clone)]
pub struct DialogueRouter {
    store: ProfileStore,
    cursors: CursorTable,
}

impl DialogueRouter {
    pub fn new(store: ProfileStore) -> Self {
        Self {
            store,
            cursors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// Users without a cursor are `Idle`.
    pub async fn state_of(&self, user_id: UserId) -> DialogueState {
        let cursors = self.cursors.read().await;
        cursors
            .get(&user_id)
            .map(|(state, _)| *state)
            .unwrap_or_default()
    }

    async fn set_state(&self, user_id: UserId, state: DialogueState) {
        let mut cursors = self.cursors.write().await;
        if state.is_idle() {
            cursors.remove(&user_id);
        } else {
            cursors.insert(user_id, (state, SystemTime::now()));
        }
    }

    /// Drops a pending step. Returns the state that was abandoned.
    pub async fn cancel(&self, user_id: UserId) -> DialogueState {
        let mut cursors = self.cursors.write().await;
        cursors
            .remove(&user_id)
            .map(|(state, _)| state)
            .unwrap_or_default()
    }

    /// Forgets cursors untouched for longer than `ttl`.
    pub async fn cleanup_cursors(&self, ttl: Duration) -> usize {
        let mut cursors = self.cursors.write().await;
        let now = SystemTime::now();
        let previous_count = cursors.len();

        cursors.retain(|_, (_, touched)| now.duration_since(*touched).unwrap_or_default() < ttl);

        let removed = previous_count - cursors.len();
        log::debug!("🧹 Cursors cleaned: {} -> {} entries", previous_count, cursors.len());
        removed
    }

    pub async fn route(&self, user_id: UserId, input: Inbound<'_>, at: DateTime<Utc>) -> Reply {
        let state = self.state_of(user_id).await;

        let step = match transition(state, input, at) {
            Ok(step) => step,
            Err(DialogueError::Invalid { field, reason }) => {
                log::debug!("Rejected {} from user {}: {}", field, user_id, reason);
                return Reply {
                    text: replies::retry(field, reason),
                    menu: None,
                    state,
                };
            }
            Err(DialogueError::UnknownCommand) => {
                log::debug!("Unknown command from user {}", user_id);
                return Reply {
                    text: replies::help(),
                    menu: Some(Menu::Main),
                    state,
                };
            }
        };

        match self.apply(user_id, step.effect).await {
            Ok((text, menu)) => {
                self.set_state(user_id, step.next).await;
                Reply { text, menu, state: step.next }
            }
            Err(e) => {
                log::error!("Store error for user {}: {}", user_id, e);
                self.set_state(user_id, DialogueState::Idle).await;
                Reply {
                    text: replies::unavailable(),
                    menu: None,
                    state: DialogueState::Idle,
                }
            }
        }
    }

    async fn apply(&self, user_id: UserId, effect: Effect) -> Result<(String, Option<Menu>), StoreError> {
        let reply = match effect {
            Effect::Prompt(field) => (replies::prompt(field), None),
            Effect::Update(patch) => {
                let profile = self.store.update(user_id, patch).await?;
                (replies::saved(&profile), Some(Menu::QuickActions))
            }
            Effect::LogSession { at } => {
                let patch = ProfilePatch::last(at);
                let profile = self.store.increment_with(user_id, Counter::Done, 1, patch).await?;
                log::info!("User {} logged session #{}", user_id, profile.done);
                (replies::session_logged(&profile), None)
            }
            Effect::ShowStatus => {
                let profile = self.store.load(user_id).await?;
                (replies::status(&profile), Some(Menu::QuickActions))
            }
            Effect::Finish => {
                let profile = self.store.load(user_id).await?;
                (replies::finished(&profile), Some(Menu::QuickActions))
            }
            Effect::Reset => {
                self.store.delete(user_id).await?;
                log::info!("Profile reset for user {}", user_id);
                (replies::reset(), Some(Menu::Main))
            }
        };
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Field, MenuCommand};
    use tempfile::TempDir;

    fn router() -> (TempDir, DialogueRouter) {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("database.json"));
        (dir, DialogueRouter::new(store))
    }

    async fn say(router: &DialogueRouter, user: UserId, text: &str) -> Reply {
        router.route(user, Inbound::Text(text), Utc::now()).await
    }

    #[tokio::test]
    async fn goal_dialogue_then_number_in_idle_is_ignored() {
        let (_dir, router) = router();
        let user = UserId(42);

        let reply = say(&router, user, "set goal").await;
        assert_eq!(reply.state, DialogueState::AwaitingGoal);
        assert_eq!(reply.text, replies::prompt(Field::Goal));

        let reply = say(&router, user, "12").await;
        assert_eq!(reply.state, DialogueState::Idle);
        assert_eq!(router.state_of(user).await, DialogueState::Idle);
        assert_eq!(router.store().load(user).await.unwrap().goal, 12);

        let reply = say(&router, user, "12").await;
        assert_eq!(reply.text, replies::help());
        assert_eq!(reply.state, DialogueState::Idle);
        assert_eq!(router.store().load(user).await.unwrap().goal, 12);
    }

    #[tokio::test]
    async fn invalid_goal_reprompts_without_writing() {
        let (_dir, router) = router();
        let user = UserId(1);
        router.store().update(user, ProfilePatch::goal(4)).await.unwrap();

        say(&router, user, "🎯 Goal").await;
        let reply = say(&router, user, "lots").await;

        assert_eq!(reply.state, DialogueState::AwaitingGoal);
        assert!(reply.text.starts_with("⚠️"));
        assert_eq!(router.state_of(user).await, DialogueState::AwaitingGoal);
        assert_eq!(router.store().load(user).await.unwrap().goal, 4);
    }

    #[tokio::test]
    async fn starting_a_step_does_not_create_a_record() {
        let (_dir, router) = router();
        say(&router, UserId(1), "sport").await;
        assert!(!router.store().path().exists());
    }

    #[tokio::test]
    async fn five_sessions_earn_one_award() {
        let (_dir, router) = router();
        let user = UserId(5);

        for n in 1..=6 {
            let reply = router
                .route(user, Inbound::Command(MenuCommand::AddSession), Utc::now())
                .await;
            assert_eq!(reply.state, DialogueState::AwaitingComment);
            if n == 5 {
                assert!(reply.text.contains("New award"));
            }
            let reply = say(&router, user, &format!("session {}", n)).await;
            assert_eq!(reply.state, DialogueState::Idle);

            let profile = router.store().load(user).await.unwrap();
            assert_eq!(profile.done, n);
            assert_eq!(profile.awards, n / 5);
        }

        let profile = router.store().load(user).await.unwrap();
        assert_eq!(profile.awards, 1);
        assert_eq!(profile.comment, "session 6");
        assert!(profile.last.is_some());
    }

    #[tokio::test]
    async fn cursors_are_per_user() {
        let (_dir, router) = router();
        let (alice, bob) = (UserId(1), UserId(2));

        say(&router, alice, "plan").await;
        assert_eq!(router.state_of(alice).await, DialogueState::AwaitingNextDate);
        assert_eq!(router.state_of(bob).await, DialogueState::Idle);

        let reply = say(&router, bob, "20.06").await;
        assert_eq!(reply.text, replies::help());

        say(&router, alice, "20.06").await;
        assert_eq!(router.store().load(alice).await.unwrap().next, "20.06");
        assert_eq!(router.store().load(bob).await.unwrap().next, "unscheduled");
    }

    #[tokio::test]
    async fn reset_deletes_the_record() {
        let (_dir, router) = router();
        let user = UserId(9);
        say(&router, user, "sport").await;
        say(&router, user, "climbing").await;

        let reply = say(&router, user, "🔁 Reset").await;
        assert_eq!(reply.text, replies::reset());
        assert_eq!(router.store().load(user).await.unwrap(), crate::models::Profile::default());
    }

    #[tokio::test]
    async fn corrupt_store_answers_unavailable() {
        let (_dir, router) = router();
        let user = UserId(3);
        tokio::fs::write(router.store().path(), b"[]garbage").await.unwrap();

        say(&router, user, "goal").await;
        let reply = say(&router, user, "10").await;

        assert_eq!(reply.text, replies::unavailable());
        assert_eq!(reply.state, DialogueState::Idle);
        let raw = tokio::fs::read(router.store().path()).await.unwrap();
        assert_eq!(raw, b"[]garbage");
    }

    #[tokio::test]
    async fn cancel_and_cleanup_forget_cursors() {
        let (_dir, router) = router();
        say(&router, UserId(1), "goal").await;
        say(&router, UserId(2), "sport").await;

        assert_eq!(router.cancel(UserId(1)).await, DialogueState::AwaitingGoal);
        assert_eq!(router.cancel(UserId(1)).await, DialogueState::Idle);

        assert_eq!(router.cleanup_cursors(Duration::from_secs(3600)).await, 0);
        assert_eq!(router.cleanup_cursors(Duration::ZERO).await, 1);
        assert_eq!(router.state_of(UserId(2)).await, DialogueState::Idle);
    }
}
