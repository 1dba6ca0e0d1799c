// Builders for the canonical request. The output of every function here is
// hashed, so a single byte of difference produces a signature the server
// rejects.

use crate::key::sha256_hex;
use http::HeaderMap;
use std::collections::BTreeMap;
use url::form_urlencoded;

/// Trims a header value and collapses whitespace runs to a single space.
/// Double-quoted substrings are copied verbatim, including escapes.
pub fn trim_all(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut chars = value.trim().chars().peekable();

    while let Some(c) = chars.next() {
        if c == '"' {
            output.push(c);
            let mut escaped = false;
            for quoted in chars.by_ref() {
                output.push(quoted);
                if escaped {
                    escaped = false;
                } else if quoted == '"' {
                    break;
                } else if quoted == '\\' {
                    escaped = true;
                }
            }
        } else if c.is_whitespace() {
            while chars.next_if(|next| next.is_whitespace()).is_some() {}
            output.push(' ');
        } else {
            output.push(c);
        }
    }

    output
}

/// Lower-cased header names mapped to their comma-joined, trimmed values,
/// with `host` set to `authority`. The map is ordered by name.
pub fn canonical_headers(headers: &HeaderMap, authority: &str) -> BTreeMap<String, String> {
    let mut canonical = BTreeMap::new();

    for name in headers.keys() {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .map(|value| trim_all(&String::from_utf8_lossy(value.as_bytes())))
            .collect();
        // HeaderName is always lower case
        canonical.insert(name.as_str().to_owned(), values.join(","));
    }

    canonical.insert("host".to_owned(), authority.to_ascii_lowercase());
    canonical
}

pub fn signed_headers(canonical_headers: &BTreeMap<String, String>) -> String {
    canonical_headers
        .keys()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(";")
}

/// Percent-encodes everything except the RFC 3986 unreserved characters.
pub fn uri_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

/// Decodes the query into pairs, re-encodes them and sorts them by key.
pub fn canonical_query_string(query: Option<&str>) -> String {
    let Some(query) = query.map(|q| q.trim_start_matches('?')) else {
        return String::new();
    };
    if query.trim().is_empty() {
        return String::new();
    }

    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (uri_encode(&key), uri_encode(&value)))
        .collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn canonical_request(
    method: &str,
    path: &str,
    canonical_query: &str,
    canonical_headers: &BTreeMap<String, String>,
    body: &[u8],
) -> String {
    let path = if path.is_empty() { "/" } else { path };

    let mut header_block = String::new();
    for (name, value) in canonical_headers {
        header_block.push_str(name);
        header_block.push(':');
        header_block.push_str(value);
        header_block.push('\n');
    }

    format!(
        "{method}\n{path}\n{canonical_query}\n{header_block}\n{}\n{}",
        signed_headers(canonical_headers),
        sha256_hex(body)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderName, HeaderValue};

    #[test]
    fn test_trim_all() {
        assert_eq!(trim_all("  value  "), "value");
        assert_eq!(trim_all("a   b \t c"), "a b c");
        assert_eq!(trim_all("a \"b   c\"  d"), "a \"b   c\" d");
        // escaped quote does not end the quoted section
        assert_eq!(trim_all("\"x \\\"  y\"   z"), "\"x \\\"  y\" z");
        // unterminated quote copies the rest verbatim
        assert_eq!(trim_all("a \"b   c"), "a \"b   c");
    }

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("AZaz09-_.~"), "AZaz09-_.~");
        assert_eq!(uri_encode("a b"), "a%20b");
        assert_eq!(uri_encode("a+b=c/d"), "a%2Bb%3Dc%2Fd");
        assert_eq!(uri_encode("ü"), "%C3%BC");
    }

    #[test]
    fn test_canonical_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Amz-Date", HeaderValue::from_static("20150830T123600Z"));
        headers.append("My-Header", HeaderValue::from_static("  value1  "));
        headers.append("My-Header", HeaderValue::from_static("a   b   c"));
        headers.insert("Host", HeaderValue::from_static("ignored.example.com"));

        let canonical = canonical_headers(&headers, "Search.Example.com:9200");

        assert_eq!(
            canonical.into_iter().collect::<Vec<_>>(),
            vec![
                ("host".to_string(), "search.example.com:9200".to_string()),
                ("my-header".to_string(), "value1,a b c".to_string()),
                ("x-amz-date".to_string(), "20150830T123600Z".to_string()),
            ]
        );
    }

    #[test]
    fn test_canonical_headers_idempotent() {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.append("X-Multi", HeaderValue::from_static(" one  two "));
        headers.append("X-Multi", HeaderValue::from_static("\"quoted   text\""));

        let first = canonical_headers(&headers, "search.example.com");

        let mut rebuilt = HeaderMap::new();
        for (name, value) in &first {
            rebuilt.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        let second = canonical_headers(&rebuilt, "search.example.com");

        assert_eq!(first, second);
    }

    #[test]
    fn test_query_order_independent() {
        let permutations = [
            "b=2&a=1&c=3",
            "c=3&b=2&a=1",
            "a=1&c=3&b=2",
            "?a=1&b=2&c=3",
        ];
        for query in permutations {
            assert_eq!(canonical_query_string(Some(query)), "a=1&b=2&c=3");
        }
    }

    #[test]
    fn test_query_encoding() {
        assert_eq!(canonical_query_string(None), "");
        assert_eq!(canonical_query_string(Some("")), "");
        assert_eq!(
            canonical_query_string(Some("q=a%20b&path=%2Fx")),
            "path=%2Fx&q=a%20b"
        );
        assert_eq!(canonical_query_string(Some("flag")), "flag=");
        assert_eq!(canonical_query_string(Some("k=2&k=1")), "k=1&k=2");
    }

    #[test]
    fn test_canonical_request_layout() {
        let canonical = canonical_request(
            "POST",
            "",
            "",
            &BTreeMap::from([("host".to_string(), "example.com".to_string())]),
            b"",
        );
        assert_eq!(
            canonical,
            "POST\n/\n\nhost:example.com\n\nhost\n\
             e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
