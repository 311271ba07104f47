pub mod handlers;
pub mod mutations;
pub mod repository;
