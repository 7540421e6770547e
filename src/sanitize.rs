//! URL scheme normalization.
//!
//! The server accepts several scheme spellings for the same endpoint:
//! `tcp` is an alias for `http`, `ssl` and `tls` are aliases for `https`,
//! and Unix sockets can be written as `unix:///path`, `http+unix:///path`
//! or the canonical `http://unix:/path`. All spellings normalize to a
//! single form so the host list can deduplicate them.

/// Normalizes a configured endpoint URL to its canonical spelling.
pub(crate) fn sanitize_url(url: &str) -> String {
    let url = alias_scheme(url.trim());
    normalize_unix(&url)
}

fn alias_scheme(url: &str) -> String {
    for (alias, scheme) in [("tcp", "http"), ("ssl", "https"), ("tls", "https")] {
        if let Some(rest) = url.strip_prefix(alias) {
            if rest.starts_with(':') || rest.starts_with('+') {
                return format!("{scheme}{rest}");
            }
        }
    }
    url.to_string()
}

fn normalize_unix(url: &str) -> String {
    for (prefix, scheme) in [
        ("unix://", "http"),
        ("http+unix://", "http"),
        ("https+unix://", "https"),
    ] {
        if let Some(path) = url.strip_prefix(prefix) {
            if path.starts_with('/') {
                return format!("{scheme}://unix:{path}");
            }
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_http_is_untouched() {
        assert_eq!(sanitize_url("http://localhost:8529"), "http://localhost:8529");
        assert_eq!(sanitize_url("https://db.example.com"), "https://db.example.com");
    }

    #[test]
    fn test_tcp_aliases_http() {
        assert_eq!(sanitize_url("tcp://localhost:8529"), "http://localhost:8529");
    }

    #[test]
    fn test_ssl_and_tls_alias_https() {
        assert_eq!(sanitize_url("ssl://localhost:8529"), "https://localhost:8529");
        assert_eq!(sanitize_url("tls://localhost:8529"), "https://localhost:8529");
    }

    #[test]
    fn test_unix_socket_forms_normalize() {
        assert_eq!(sanitize_url("unix:///tmp/arangodb.sock"), "http://unix:/tmp/arangodb.sock");
        assert_eq!(
            sanitize_url("http+unix:///tmp/arangodb.sock"),
            "http://unix:/tmp/arangodb.sock"
        );
        assert_eq!(
            sanitize_url("https+unix:///tmp/arangodb.sock"),
            "https://unix:/tmp/arangodb.sock"
        );
        // Canonical form passes through.
        assert_eq!(
            sanitize_url("http://unix:/tmp/arangodb.sock"),
            "http://unix:/tmp/arangodb.sock"
        );
    }

    #[test]
    fn test_tcp_unix_combination() {
        assert_eq!(
            sanitize_url("tcp+unix:///tmp/arangodb.sock"),
            "http://unix:/tmp/arangodb.sock"
        );
        assert_eq!(
            sanitize_url("ssl+unix:///tmp/arangodb.sock"),
            "https://unix:/tmp/arangodb.sock"
        );
    }

    #[test]
    fn test_lookalike_schemes_are_untouched() {
        // "tcpx" is not the "tcp" alias.
        assert_eq!(sanitize_url("tcpx://localhost"), "tcpx://localhost");
        assert_eq!(sanitize_url("  http://localhost:8529 "), "http://localhost:8529");
    }
}
