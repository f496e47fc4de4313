pub mod http;
pub mod simulated;
pub mod traits;
pub mod types;

pub use http::HttpBackend;
pub use simulated::SimulatedBackend;
pub use traits::{ReplyBackend, TodoApi};
pub use types::{BackendError, ReplyOutcome, ReplyPayload, ReplyRequest};
