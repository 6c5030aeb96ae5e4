//! Endpoint resolution.
//!
//! The caller's identity rides in the endpoint query string; the server
//! echoes it in presence accounting. Resolved once at `connect` time.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters escaped when placing a value in a query component: the WHATWG
/// query set plus the delimiters that would alter parameter parsing.
/// Unreserved characters pass through, keeping identities readable in logs
/// and server accounting.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'=');

/// Append the identity as an `identity` query parameter.
///
/// Respects an existing query string and percent-encodes the identity, so
/// opaque caller-supplied strings survive the trip intact.
pub fn resolve_endpoint(endpoint: &str, identity: &str) -> String {
    let encoded = utf8_percent_encode(identity, QUERY_VALUE);
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{separator}identity={encoded}")
}
