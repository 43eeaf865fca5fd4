pub mod replies;
pub mod router;
pub mod transition;

pub use router::{DialogueRouter, Menu, Reply};
pub use transition::Inbound;
