mod query_matcher;
mod upstream;

pub use query_matcher::QueryMatcher;
pub use upstream::Upstream;

// Re-export for convenience
pub use hickory_proto::op::Message;
