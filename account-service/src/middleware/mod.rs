mod session;
mod two_factor;

pub use session::{session_middleware, CurrentContext, RequestContext};
pub use two_factor::require_two_factor_middleware;
