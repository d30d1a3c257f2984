//! dnsmux application layer: the `Upstream`/`QueryMatcher` ports and the routing table.
pub mod ports;
pub mod use_cases;
