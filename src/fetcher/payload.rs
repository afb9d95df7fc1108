//! Typed shapes of the platform's JSON responses
//!
//! Only the fields we read are modeled; everything else is ignored by serde.

use serde::Deserialize;

/// `GET /p/<shortcode>/?__a=1&__d=dis`
#[derive(Debug, Deserialize)]
pub(crate) struct PostEnvelope {
    #[serde(default)]
    pub graphql: Option<GraphqlBody>,
    #[serde(default)]
    pub data: Option<DataBody>,
}

impl PostEnvelope {
    /// The post node, whichever envelope the platform used
    pub fn into_media(self) -> Option<ShortcodeMedia> {
        self.graphql
            .and_then(|g| g.shortcode_media)
            .or_else(|| self.data.and_then(|d| d.xdt_shortcode_media))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlBody {
    #[serde(default)]
    pub shortcode_media: Option<ShortcodeMedia>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DataBody {
    #[serde(default)]
    pub xdt_shortcode_media: Option<ShortcodeMedia>,
}

/// A post, or one child of a carousel
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ShortcodeMedia {
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub display_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub edge_media_to_caption: Option<Edges<CaptionNode>>,
    #[serde(default)]
    pub edge_media_preview_like: Option<Count>,
    #[serde(default)]
    pub edge_liked_by: Option<Count>,
    #[serde(default)]
    pub edge_media_to_parent_comment: Option<Count>,
    #[serde(default)]
    pub edge_media_to_comment: Option<Count>,
    #[serde(default)]
    pub edge_sidecar_to_children: Option<Edges<ShortcodeMedia>>,
}

impl ShortcodeMedia {
    /// Owner handle, empty when the platform omitted it
    pub fn owner_username(&self) -> String {
        self.owner
            .as_ref()
            .and_then(|o| o.username.clone())
            .unwrap_or_default()
    }

    /// First caption edge, empty when there is none
    pub fn caption(&self) -> String {
        self.edge_media_to_caption
            .as_ref()
            .and_then(|edges| edges.edges.first())
            .map(|edge| edge.node.text.clone())
            .unwrap_or_default()
    }

    /// Like count, when exposed
    pub fn likes(&self) -> Option<u64> {
        self.edge_media_preview_like
            .as_ref()
            .or(self.edge_liked_by.as_ref())
            .map(|c| c.count)
    }

    /// Comment count, when exposed
    pub fn comments(&self) -> Option<u64> {
        self.edge_media_to_parent_comment
            .as_ref()
            .or(self.edge_media_to_comment.as_ref())
            .map(|c| c.count)
    }

    /// Carousel children in position order, or the post itself
    pub fn flatten(&self) -> Vec<ShortcodeMedia> {
        match &self.edge_sidecar_to_children {
            Some(children) if !children.edges.is_empty() => {
                children.edges.iter().map(|e| e.node.clone()).collect()
            }
            _ => vec![self.clone()],
        }
    }

    /// URL of the full-resolution file: the video for videos, the image otherwise
    pub fn media_url(&self) -> Option<&str> {
        if self.is_video {
            self.video_url.as_deref().or(self.display_url.as_deref())
        } else {
            self.display_url.as_deref()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Owner {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Edges<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Edge<T> {
    pub node: T,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CaptionNode {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Count {
    #[serde(default)]
    pub count: u64,
}

/// `GET /api/v1/users/web_profile_info/?username=<name>`
#[derive(Debug, Deserialize)]
pub(crate) struct ProfileEnvelope {
    pub data: ProfileData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileData {
    pub user: Option<ProfileUser>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileUser {
    pub username: String,
    #[serde(default)]
    pub edge_owner_to_timeline_media: Option<Edges<ShortcodeMedia>>,
}
