pub mod gpt;
pub mod health;
