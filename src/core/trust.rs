use url::Url;

const LOOPBACK_HOSTS: [&str; 2] = ["127.0.0.1", "localhost"];

/// Decides which hosts sit behind our own security proxy.
///
/// Both the impersonation headers on the capabilities request and the admin
/// credentials on the datastore connection go through [`TrustPolicy::is_trusted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustPolicy {
    secure_host: String,
}

impl TrustPolicy {
    pub fn new(secure_host: impl Into<String>) -> Self {
        Self {
            secure_host: secure_host.into(),
        }
    }

    pub fn secure_host(&self) -> &str {
        &self.secure_host
    }

    pub fn is_trusted(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => self.is_trusted_host(host),
            None => false,
        }
    }

    pub fn is_trusted_host(&self, host: &str) -> bool {
        host.eq_ignore_ascii_case(&self.secure_host)
            || LOOPBACK_HOSTS.iter().any(|h| host.eq_ignore_ascii_case(h))
    }
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self::new("localhost")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_host_any_case() {
        let policy = TrustPolicy::new("geo.example.org");
        assert!(policy.is_trusted(&Url::parse("https://GEO.example.org/geoserver/wfs").unwrap()));
        assert!(policy.is_trusted(&Url::parse("http://geo.example.org:8080/wfs").unwrap()));
    }

    #[test]
    fn test_loopback_is_trusted() {
        let policy = TrustPolicy::new("geo.example.org");
        assert!(policy.is_trusted(&Url::parse("http://127.0.0.1:8080/wfs").unwrap()));
        assert!(policy.is_trusted(&Url::parse("http://LOCALHOST/wfs").unwrap()));
    }

    #[test]
    fn test_other_hosts_are_not_trusted() {
        let policy = TrustPolicy::new("geo.example.org");
        assert!(!policy.is_trusted(&Url::parse("http://evil.example.org/wfs").unwrap()));
        assert!(!policy.is_trusted(&Url::parse("http://geo.example.org.evil.net/wfs").unwrap()));
        assert!(!policy.is_trusted(&Url::parse("http://10.0.0.1/wfs").unwrap()));
    }
}
