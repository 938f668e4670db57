pub mod health;
pub mod manifest;
