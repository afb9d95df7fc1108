//! Repost caption rendering
//!
//! Pure string formatting. Nothing here can fail.

use crate::types::DownloadOptions;

/// Placeholder replaced with the owner handle in custom templates
pub const OWNER_PLACEHOLDER: &str = "@username";

/// Inputs to a rendered caption
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptionRecord<'a> {
    /// Handle of the account that posted the content
    pub owner: &'a str,
    /// Caption as published, empty when there is none
    pub original_caption: &'a str,
    /// Whether to credit the owner
    pub enabled: bool,
    /// Custom credit line, see [`build_with_template`]
    pub template: Option<&'a str>,
}

impl<'a> CaptionRecord<'a> {
    /// Collect caption inputs from a fetched post and the request options
    pub fn new(owner: &'a str, original_caption: &'a str, options: &'a DownloadOptions) -> Self {
        Self {
            owner,
            original_caption,
            enabled: options.repost_caption,
            template: options.caption_template.as_deref(),
        }
    }

    /// Render the caption text
    pub fn render(&self) -> String {
        match (self.enabled, self.template) {
            (false, _) => self.original_caption.to_string(),
            (true, Some(template)) => build_with_template(self.owner, self.original_caption, template),
            (true, None) => build(self.owner, self.original_caption, true),
        }
    }
}

/// Render the default repost caption
///
/// ```
/// use repost_dl::caption::build;
///
/// assert_eq!(build("alice", "Sunset", true), "#Repost from @alice\n\nSunset");
/// assert_eq!(build("alice", "Sunset", false), "Sunset");
/// ```
///
/// With an empty original caption the credit line stands alone.
pub fn build(owner: &str, original_caption: &str, repost_enabled: bool) -> String {
    if !repost_enabled {
        return original_caption.to_string();
    }

    let credit = format!("#Repost from @{owner}");
    if original_caption.is_empty() {
        credit
    } else {
        format!("{credit}\n\n{original_caption}")
    }
}

/// Render a caption from a custom credit template
///
/// Every `@username` in `template` becomes `@{owner}` and the original caption
/// is appended directly, so the template carries its own separator. A blank
/// template yields the original caption only.
pub fn build_with_template(owner: &str, original_caption: &str, template: &str) -> String {
    if template.trim().is_empty() {
        return original_caption.to_string();
    }

    let mut caption = template.replace(OWNER_PLACEHOLDER, &format!("@{owner}"));
    caption.push_str(original_caption);
    caption
}
