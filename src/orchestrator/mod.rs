pub mod controller;
pub mod engine;
pub mod events;
pub mod fanout;
mod loop_worker;
pub mod wiring;

pub use controller::EngineController;
pub use engine::EngineCore;
pub use events::EngineEvent;
pub use fanout::{fan_out, Invocation};
pub use wiring::Collaborators;
