//! Identifier classification
//!
//! Decides how a raw identifier token found in an entity stream has to be
//! resolved before it can be used as a canonical URI.

/// Classification of a raw identifier token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdKind<'a> {
    /// Already canonical: "http://..." or "https://..."
    FullUri,
    /// Compact URI "prefix:local", split on the first ':'
    Curie { prefix: &'a str, local: &'a str },
    /// No scheme and no prefix, resolved against the default namespace
    Bare,
}

/// Classify an identifier token
pub fn classify_id(id: &str) -> IdKind<'_> {
    if is_full_uri(id) {
        IdKind::FullUri
    } else if let Some((prefix, local)) = id.split_once(':') {
        IdKind::Curie { prefix, local }
    } else {
        IdKind::Bare
    }
}

/// True for identifiers that carry an http(s) scheme
pub fn is_full_uri(id: &str) -> bool {
    id.starts_with("http://") || id.starts_with("https://")
}

/// Local name of a URI: the part after the last '#', else after the last
/// '/', else the whole string
///
/// "http://example.org/ns#color" -> "color"
/// "http://example.org/ns/color" -> "color"
pub fn local_name(uri: &str) -> &str {
    if let Some(pos) = uri.rfind('#') {
        &uri[pos + 1..]
    } else if let Some(pos) = uri.rfind('/') {
        &uri[pos + 1..]
    } else {
        uri
    }
}
