pub mod middleware;
pub mod request_id;

pub use middleware::{session_middleware, SessionContext};
pub use request_id::{request_id_middleware, RequestId};
