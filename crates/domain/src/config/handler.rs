use serde::{Deserialize, Serialize};

/// One routing rule: the upstream answers when any matcher in `matchers` matches.
///
/// ```toml
/// [[handlers]]
/// match = [{ kind = "domain", domains = ["lan"] }]
/// upstream = { kind = "const", type = "A", value = "192.168.1.1" }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HandlerConfig {
    #[serde(rename = "match", default)]
    pub matchers: Vec<MatcherConfig>,

    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatcherConfig {
    All,

    #[serde(alias = "query_type")]
    Type { types: Vec<String> },

    #[serde(alias = "match_domain")]
    Domain { domains: Vec<String> },

    And {
        #[serde(rename = "match", default)]
        matchers: Vec<MatcherConfig>,
    },

    Or {
        #[serde(rename = "match", default)]
        matchers: Vec<MatcherConfig>,
    },

    Not {
        #[serde(rename = "match")]
        matcher: Box<MatcherConfig>,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpstreamConfig {
    Forward {
        server: String,

        #[serde(default = "default_forward_timeout_ms")]
        timeout_ms: u64,
    },

    Cache {
        upstream: Box<UpstreamConfig>,
    },

    Const {
        #[serde(rename = "type", default = "default_const_type")]
        record_type: String,

        #[serde(alias = "name")]
        value: String,
    },

    Terminate,
}

impl UpstreamConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Forward { .. } => "forward",
            Self::Cache { .. } => "cache",
            Self::Const { .. } => "const",
            Self::Terminate => "terminate",
        }
    }
}

fn default_forward_timeout_ms() -> u64 {
    5_000
}

fn default_const_type() -> String {
    "A".to_string()
}
