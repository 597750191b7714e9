pub mod chat;
pub mod core;
pub mod event;
pub mod interactions;
pub mod knowledge;
pub mod llm;
pub mod server;
pub mod state;
