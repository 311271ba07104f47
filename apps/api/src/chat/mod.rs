pub mod conversation;
pub mod handlers;
pub mod prompts;
