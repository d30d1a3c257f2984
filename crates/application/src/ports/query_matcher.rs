use hickory_proto::op::Message;

pub trait QueryMatcher: Send + Sync {
    /// Pure predicate over a decoded request.
    fn matches(&self, message: &Message) -> bool;
}
