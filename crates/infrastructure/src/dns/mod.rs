pub mod buffer_pool;
pub mod codec;
pub(crate) mod framing;
pub mod matcher;
pub mod provision;
pub mod server;
pub mod transport;
pub mod upstream;

pub use buffer_pool::{BufferPool, PoolStats, PooledBuffer, MAX_MESSAGE_SIZE};
pub use matcher::{Matcher, SuffixTree};
pub use provision::build_router;
pub use upstream::{CacheUpstream, ConstUpstream, ForwardUpstream, TerminateUpstream};
