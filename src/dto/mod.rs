pub mod health;
pub mod lobby;
pub mod ws;
