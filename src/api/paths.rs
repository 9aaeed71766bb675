//! All Paths are recorded here for use throughout this codebase
pub mod base {
    pub const ROOT: &str = "/";
    pub const HEALTH: &str = "/health";
    pub const ABOUT: &str = "/about";
}

pub mod liveness {
    pub const ANNOUNCE: &str = "/v1/namespaces/:namespace/announce";
    pub const PEERS: &str = "/v1/namespaces/:namespace/peers";
    pub const CLEANUP: &str = "/v1/namespaces/:namespace/cleanup";
}

/// Namespaces are used verbatim as a path segment: `[A-Za-z0-9._-]+`
pub fn is_valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty()
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Fill in the `:namespace` segment of one of the liveness paths
pub fn namespace_path(template: &str, namespace: &str) -> String {
    template.replace(":namespace", namespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_path() {
        assert_eq!(
            namespace_path(liveness::PEERS, "fleet"),
            "/v1/namespaces/fleet/peers"
        );
    }

    #[test]
    fn test_namespace_charset() {
        assert!(is_valid_namespace("fleet-a_1.prod"));
        for bad in ["", "a/b", "a?b", "a#b", "50%", "sp ace", "é"] {
            assert!(!is_valid_namespace(bad), "{:?} accepted", bad);
        }
    }
}
