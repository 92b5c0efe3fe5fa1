//! Diagram source encoding for the remote engine URL.
//!
//! The hosted renderer takes the diagram in the URL path as URL-safe base64
//! without padding (`+`→`-`, `/`→`_`). Percent-encoding would also be
//! URL-safe, but the service only understands base64url.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

/// Encode diagram source for a `{endpoint}/mermaid/{format}/{encoded}` URL.
pub fn encode_source(source: &str) -> String {
    URL_SAFE_NO_PAD.encode(source.as_bytes())
}

/// Build the full remote render URL.
pub fn remote_url(endpoint: &str, format: &str, source: &str) -> String {
    format!(
        "{}/mermaid/{}/{}",
        endpoint.trim_end_matches('/'),
        format,
        encode_source(source)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrow_is_base64url_not_percent_encoded() {
        let enc = encode_source("A-->B");
        assert_ne!(enc, "A--%3EB");
        let decoded = URL_SAFE_NO_PAD.decode(&enc).unwrap();
        assert_eq!(decoded, b"A-->B");
    }

    #[test]
    fn no_padding_or_unsafe_chars() {
        let enc = encode_source("graph TD\n  A[Start] --> B{Is it?}\n???>>>");
        assert!(!enc.contains('='));
        assert!(!enc.contains('+'));
        assert!(!enc.contains('/'));
    }

    #[test]
    fn url_shape() {
        assert_eq!(
            remote_url("https://kroki.io/", "png", "A"),
            "https://kroki.io/mermaid/png/QQ"
        );
    }
}
