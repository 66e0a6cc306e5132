pub mod dto;
pub mod jwt;

pub use dto::SessionResponse;
pub use jwt::{Claims, IssuedSession, SessionTokens, VerifiedSession};
