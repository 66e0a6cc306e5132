pub mod health;
pub mod jobs;
pub mod session;
pub mod voices;
