pub mod jobs;
pub mod session;
pub mod synthesis;
