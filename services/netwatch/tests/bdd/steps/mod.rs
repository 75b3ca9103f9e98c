//! BDD step definitions for netwatch service

pub mod api_steps;
pub mod hysteresis_steps;
pub mod internet_steps;
pub mod lifecycle_steps;
