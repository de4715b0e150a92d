pub mod delivery;
pub mod handler;
pub mod listing;
pub mod publisher;
pub mod scheduled;
pub mod telegram;
