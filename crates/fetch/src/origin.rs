//! Referer/Origin selection for upstream requests.
//!
//! Hotlink-protected hosts only answer when the request looks like it comes from
//! their own player page. Precedence:
//! 1. an explicit referer supplied by the caller
//! 2. the known-domain table
//! 3. `https://{host}/` of the target itself

/// A host pattern with a fixed referer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownDomain {
    /// Substring matched against the target host.
    pub host_contains: String,
    pub referer: String,
}

impl KnownDomain {
    pub fn new(host_contains: impl Into<String>, referer: impl Into<String>) -> Self {
        Self {
            host_contains: host_contains.into(),
            referer: referer.into(),
        }
    }
}

/// The chosen spoofed identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoofedOrigin {
    pub referer: String,
    pub origin: String,
}

#[derive(Debug, Clone)]
pub struct OriginResolver {
    known: Vec<KnownDomain>,
}

impl Default for OriginResolver {
    fn default() -> Self {
        Self {
            known: vec![
                KnownDomain::new("padorupado.ru", "https://kwik.si/"),
                KnownDomain::new("kwik", "https://kwik.si/"),
            ],
        }
    }
}

impl OriginResolver {
    pub fn new(known: Vec<KnownDomain>) -> Self {
        Self { known }
    }

    /// Add a table entry; earlier entries win.
    pub fn with_domain(mut self, domain: KnownDomain) -> Self {
        self.known.push(domain);
        self
    }

    /// Pick the referer/origin pair for `target_url`. Never fails.
    pub fn resolve(&self, target_url: &str, explicit_referer: Option<&str>) -> SpoofedOrigin {
        let explicit = explicit_referer.map(str::trim).filter(|r| !r.is_empty());

        let host = extract_host(target_url);
        let referer = match explicit {
            Some(referer) => referer.to_string(),
            None => self
                .known
                .iter()
                .find(|d| host.contains(d.host_contains.as_str()))
                .map(|d| d.referer.clone())
                .unwrap_or_else(|| format!("https://{host}/")),
        };

        let origin = origin_of(&referer);
        SpoofedOrigin { referer, origin }
    }
}

/// Lower-cased hostname of a URL, without port or userinfo.
///
/// Inputs that do not parse as absolute URLs fall back to a lexical split.
pub fn extract_host(url: &str) -> String {
    if let Some(host) = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    {
        return host;
    }

    let rest = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let mut host = &rest[..end];
    if let Some(at) = host.rfind('@') {
        host = &host[at + 1..];
    }
    if let Some(colon) = host.rfind(':')
        && !host.ends_with(']')
    {
        host = &host[..colon];
    }
    host.to_ascii_lowercase()
}

/// `scheme://host[:port]` prefix of a referer.
pub fn origin_of(referer: &str) -> String {
    match referer.find("://") {
        Some(idx) => {
            let rest = &referer[idx + 3..];
            let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
            referer[..idx + 3 + end].to_string()
        }
        None => referer.trim_end_matches('/').to_string(),
    }
}
