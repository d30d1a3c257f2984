//! Request predicates used to pick a routing rule.

mod suffix_tree;

pub use suffix_tree::SuffixTree;

use dnsmux_application::ports::QueryMatcher;
use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use smallvec::SmallVec;

pub enum Matcher {
    All,
    QueryType(SmallVec<[RecordType; 4]>),
    Domain(SuffixTree),
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
    Not(Box<Matcher>),
}

impl Matcher {
    pub fn query_type<I: IntoIterator<Item = RecordType>>(types: I) -> Self {
        Self::QueryType(types.into_iter().collect())
    }

    pub fn domain<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Domain(domains.into_iter().collect())
    }

    pub fn not(inner: Matcher) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::QueryType(_) => "type",
            Self::Domain(_) => "domain",
            Self::And(_) => "and",
            Self::Or(_) => "or",
            Self::Not(_) => "not",
        }
    }

    pub fn matches(&self, message: &Message) -> bool {
        match self {
            Self::All => true,
            Self::QueryType(types) => message
                .queries()
                .iter()
                .any(|query| types.contains(&query.query_type())),
            Self::Domain(tree) => message
                .queries()
                .iter()
                .any(|query| tree.matches_name(query.name())),
            Self::And(children) => children.iter().all(|child| child.matches(message)),
            Self::Or(children) => children.iter().any(|child| child.matches(message)),
            Self::Not(child) => !child.matches(message),
        }
    }
}

impl QueryMatcher for Matcher {
    fn matches(&self, message: &Message) -> bool {
        Matcher::matches(self, message)
    }
}
