// Durable state: lobbies, participations, rounds, questions, answers

pub use models::*;
pub use postgres::PostgresStore;
pub use repository::{InMemoryStore, Store};

pub mod models;
mod postgres;
pub mod repository;
