//! Parsing raw user input into a [`ContentReference`]

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use url::Url;
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Hosts whose URLs we accept
const ACCEPTED_HOSTS: &[&str] = &[
    "instagram.com",
    "www.instagram.com",
    "m.instagram.com",
    "instagr.am",
];

/// Single path segments that are site sections, not accounts
const RESERVED_SEGMENTS: &[&str] = &[
    "explore", "accounts", "stories", "direct", "reels", "about",
];

/// Kind of content a reference points at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// Regular post (`/p/<shortcode>`)
    Post,
    /// Reel (`/reel/<shortcode>`)
    Reel,
    /// IGTV video (`/tv/<shortcode>`)
    Tv,
    /// Account timeline
    Profile,
}

impl ReferenceKind {
    /// Whether the reference names a single post (post, reel or tv)
    pub fn is_post(&self) -> bool {
        !matches!(self, ReferenceKind::Profile)
    }
}

/// Normalized identifier for a piece of remote content
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct ContentReference {
    /// What the value identifies
    pub kind: ReferenceKind,
    /// Shortcode for posts, username for profiles
    pub value: String,
}

impl ContentReference {
    /// Reference to a post by shortcode
    pub fn post(shortcode: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::Post,
            value: shortcode.into(),
        }
    }

    /// Reference to an account
    pub fn profile(username: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::Profile,
            value: username.into(),
        }
    }

    /// Human-readable description, e.g. "Post/Reel: CxYz123"
    pub fn describe(&self) -> String {
        if self.kind.is_post() {
            format!("Post/Reel: {}", self.value)
        } else {
            format!("Profile: @{}", self.value)
        }
    }
}

impl std::fmt::Display for ContentReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ReferenceKind::Post => write!(f, "post {}", self.value),
            ReferenceKind::Reel => write!(f, "reel {}", self.value),
            ReferenceKind::Tv => write!(f, "tv {}", self.value),
            ReferenceKind::Profile => write!(f, "profile @{}", self.value),
        }
    }
}

// Both patterns are literals, compiling them cannot fail.
#[allow(clippy::expect_used)]
fn shortcode_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{5,64}$").expect("shortcode pattern"))
}

#[allow(clippy::expect_used)]
fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._]{1,30}$").expect("username pattern"))
}

/// Resolve a URL or bare username into a [`ContentReference`]
///
/// Accepted forms:
/// - `https://www.instagram.com/p/<code>/`, `/reel/<code>`, `/tv/<code>` (scheme optional
///   when the input starts with `www.`)
/// - `https://www.instagram.com/<username>/`
/// - `username` or `@username`
///
/// # Errors
///
/// Returns [`Error::InvalidReference`] when the input matches none of these.
///
/// # Example
///
/// ```
/// use repost_dl::fetcher::{resolve, ReferenceKind};
///
/// let reference = resolve("https://www.instagram.com/reel/CxYz123/?igsh=abc").unwrap();
/// assert_eq!(reference.kind, ReferenceKind::Reel);
/// assert_eq!(reference.value, "CxYz123");
/// ```
pub fn resolve(raw: &str) -> Result<ContentReference> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(Error::InvalidReference(
            "URL or username is required".to_string(),
        ));
    }

    let lower = input.to_ascii_lowercase();
    if lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("www.")
        || lower.starts_with("instagram.com/")
    {
        let with_scheme = if lower.starts_with("http") {
            input.to_string()
        } else {
            format!("https://{input}")
        };
        return resolve_url(&with_scheme, input);
    }

    resolve_username(input)
}

fn resolve_url(url: &str, original: &str) -> Result<ContentReference> {
    let invalid = || Error::InvalidReference(format!("unrecognized Instagram URL: {original}"));

    let parsed = Url::parse(url).map_err(|_| invalid())?;
    let host = parsed.host_str().map(str::to_ascii_lowercase).ok_or_else(invalid)?;
    if !ACCEPTED_HOSTS.contains(&host.as_str()) {
        return Err(Error::InvalidReference(format!(
            "not an Instagram URL: {original}"
        )));
    }

    let parts: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    // /p/<code>, /reel/<code>, /tv/<code>, also when prefixed by /<username>/
    for (i, part) in parts.iter().enumerate() {
        let kind = match *part {
            "p" => ReferenceKind::Post,
            "reel" | "reels" => ReferenceKind::Reel,
            "tv" => ReferenceKind::Tv,
            _ => continue,
        };
        if let Some(code) = parts.get(i + 1) {
            if shortcode_pattern().is_match(code) {
                return Ok(ContentReference {
                    kind,
                    value: (*code).to_string(),
                });
            }
        }
        return Err(invalid());
    }

    match parts.as_slice() {
        [username] => {
            if RESERVED_SEGMENTS.contains(username) {
                return Err(invalid());
            }
            resolve_username(username)
        }
        [.., last] if last.len() >= 6 && last.chars().all(|c| c.is_ascii_alphanumeric()) => {
            Ok(ContentReference::post(*last))
        }
        _ => Err(invalid()),
    }
}

fn resolve_username(input: &str) -> Result<ContentReference> {
    let username = input.strip_prefix('@').unwrap_or(input);
    if !username_pattern().is_match(username) || username.chars().all(|c| c == '.') {
        return Err(Error::InvalidReference(format!(
            "not a valid Instagram URL or username: {input}"
        )));
    }
    Ok(ContentReference::profile(username))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_post_url_with_query_and_trailing_slash() {
        let reference = resolve("https://www.instagram.com/p/CxYz123AbC/?utm_source=ig_web").unwrap();
        assert_eq!(reference, ContentReference::post("CxYz123AbC"));
    }

    #[test]
    fn resolves_reel_and_tv_urls() {
        let reel = resolve("https://instagram.com/reel/Reel_42-x").unwrap();
        assert_eq!(reel.kind, ReferenceKind::Reel);
        assert_eq!(reel.value, "Reel_42-x");

        let tv = resolve("https://www.instagram.com/tv/TvCode9/").unwrap();
        assert_eq!(tv.kind, ReferenceKind::Tv);
        assert_eq!(tv.value, "TvCode9");
    }

    #[test]
    fn accepts_www_prefix_without_scheme() {
        let reference = resolve("www.instagram.com/p/ABCDEF1/").unwrap();
        assert_eq!(reference, ContentReference::post("ABCDEF1"));
    }

    #[test]
    fn resolves_post_url_nested_under_username() {
        let reference = resolve("https://www.instagram.com/alice/p/ABCDEF1/").unwrap();
        assert_eq!(reference, ContentReference::post("ABCDEF1"));
    }

    #[test]
    fn single_segment_url_is_a_profile() {
        let reference = resolve("https://www.instagram.com/alice.smith_/").unwrap();
        assert_eq!(reference, ContentReference::profile("alice.smith_"));
    }

    #[test]
    fn bare_username_with_or_without_at_sign() {
        assert_eq!(resolve("alice").unwrap(), ContentReference::profile("alice"));
        assert_eq!(resolve("  @alice  ").unwrap(), ContentReference::profile("alice"));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(resolve("   "), Err(Error::InvalidReference(_))));
    }

    #[test]
    fn rejects_foreign_hosts() {
        assert!(matches!(
            resolve("https://example.com/p/ABCDEF1/"),
            Err(Error::InvalidReference(_))
        ));
    }

    #[test]
    fn rejects_implausible_usernames() {
        let too_long = "x".repeat(31);
        for input in ["hello world", "a/b", "name!", "...", too_long.as_str()] {
            assert!(
                matches!(resolve(input), Err(Error::InvalidReference(_))),
                "{input:?} must be rejected"
            );
        }
    }

    #[test]
    fn rejects_post_marker_without_code() {
        assert!(resolve("https://www.instagram.com/p/").is_err());
        assert!(resolve("https://www.instagram.com/p/ab/").is_err());
    }

    #[test]
    fn rejects_reserved_sections() {
        assert!(resolve("https://www.instagram.com/explore/").is_err());
    }

    #[test]
    fn describe_distinguishes_posts_and_profiles() {
        assert_eq!(ContentReference::post("ABC123").describe(), "Post/Reel: ABC123");
        assert_eq!(ContentReference::profile("alice").describe(), "Profile: @alice");
    }
}
