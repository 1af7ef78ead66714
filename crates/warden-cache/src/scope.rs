//! Cache lifecycles

/// Lifecycle of a named cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CacheScope {
    /// Entries are visible, with eventual consistency, to every node sharing the backend
    #[default]
    ClusterReplicated,
    /// Entries belong to one in-flight request and are swept when it ends
    Request,
}

impl CacheScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheScope::ClusterReplicated => "cluster_replicated",
            CacheScope::Request => "request",
        }
    }
}

impl std::fmt::Display for CacheScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CacheScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cluster_replicated" => Ok(CacheScope::ClusterReplicated),
            "request" => Ok(CacheScope::Request),
            _ => Err(format!("Invalid cache scope: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_scope() {
        assert_eq!(CacheScope::default(), CacheScope::ClusterReplicated);
        assert_eq!(CacheScope::Request.as_str(), "request");
        assert_eq!(CacheScope::ClusterReplicated.to_string(), "cluster_replicated");
        assert_eq!(
            "request".parse::<CacheScope>().unwrap(),
            CacheScope::Request
        );
        assert!("thread".parse::<CacheScope>().is_err());
    }
}
