//! The upstream chain: forwarding, caching, constant answers, echo.

pub mod cache;
pub mod constant;
pub mod forward;
pub mod terminate;

pub use cache::CacheUpstream;
pub use constant::ConstUpstream;
pub use forward::ForwardUpstream;
pub use terminate::TerminateUpstream;
