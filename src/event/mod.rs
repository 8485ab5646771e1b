// Event-driven plumbing between state-changing actions and live viewers

pub use bus::EventBus;
pub use events::{Event, EventPayload};
pub use handler::{EventError, EventHandler};

mod bus;
mod events;
mod handler;
