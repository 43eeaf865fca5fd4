pub mod dialogue_state;
pub mod menu;
pub mod profile;

pub use dialogue_state::{DialogueState, Field};
pub use menu::MenuCommand;
pub use profile::{Counter, LastSession, Profile, ProfilePatch};
