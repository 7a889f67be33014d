#![forbid(unsafe_code)]

pub mod env_info;
pub mod health;
pub mod welcome;
