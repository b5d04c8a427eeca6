pub mod auth;
pub mod authors;
pub mod books;
pub mod chat;
pub mod server;
pub mod users;

pub use server::{AppState, run};
