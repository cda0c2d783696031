use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Item Identity
// ============================================================================

/// Any entity with a stable, opaque, unique identifier.
///
/// The paging engine assumes nothing else about item shape: de-duplication and
/// targeted mutation both key off `id()`.
pub trait Identifiable {
    fn id(&self) -> &str;
}

/// Boolean fields that the optimistic controller knows how to flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleField {
    /// Post liked by the current user.
    Liked,
    /// Current user follows this user.
    Following,
    /// Notification has been seen.
    Read,
    /// Follow request has been accepted.
    Accepted,
}

impl ToggleField {
    pub fn name(self) -> &'static str {
        match self {
            ToggleField::Liked => "liked",
            ToggleField::Following => "following",
            ToggleField::Read => "read",
            ToggleField::Accepted => "accepted",
        }
    }
}

impl fmt::Display for ToggleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Items exposing one or more [`ToggleField`]s.
///
/// `toggle` returns `None` when the field does not apply to this item type.
/// `set_toggle` returns `false` in the same case and leaves the item untouched.
pub trait Toggleable {
    fn toggle(&self, field: ToggleField) -> Option<bool>;
    fn set_toggle(&mut self, field: ToggleField, value: bool) -> bool;
}

// ============================================================================
// Pages
// ============================================================================

/// One page of a paginated resource, already decoded from the wire envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, has_more: bool) -> Self {
        Self { items, has_more }
    }

    /// Terminal empty page (`hasMore = false`, no items).
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
        }
    }
}

/// Paginated resources served by the backend.
///
/// Display formatting is the only place behaviour differs per kind; loading
/// logic is shared by every controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Home feed of all visible posts.
    Feed,
    /// Posts matching the search text.
    SearchPosts,
    /// Users matching the search text.
    SearchUsers,
    /// Notifications addressed to the current user.
    Notifications,
    /// Users following the viewed user.
    Followers,
    /// Users the viewed user follows.
    Following,
    /// Posts authored by the viewed user (carousel).
    UserPosts,
}

impl ResourceKind {
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Feed => "Feed",
            ResourceKind::SearchPosts => "Posts",
            ResourceKind::SearchUsers => "Users",
            ResourceKind::Notifications => "Notifications",
            ResourceKind::Followers => "Followers",
            ResourceKind::Following => "Following",
            ResourceKind::UserPosts => "Posts",
        }
    }

    /// Text shown in place of the list when page 1 came back empty.
    pub fn empty_message(self) -> &'static str {
        match self {
            ResourceKind::Feed => "Nothing here yet",
            ResourceKind::SearchPosts | ResourceKind::SearchUsers => "No results found",
            ResourceKind::Notifications => "No notifications",
            ResourceKind::Followers => "No followers yet",
            ResourceKind::Following => "Not following anyone yet",
            ResourceKind::UserPosts => "No posts yet!",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Wire Types
// ============================================================================

/// A journal post as listed in feeds and search results.
///
/// `content` is the rich-text document rendered to HTML by the editor; the
/// client only ever previews it as plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub visibility: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub like_count: u32,
}

impl Identifiable for Post {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Toggleable for Post {
    fn toggle(&self, field: ToggleField) -> Option<bool> {
        match field {
            ToggleField::Liked => Some(self.liked),
            _ => None,
        }
    }

    fn set_toggle(&mut self, field: ToggleField, value: bool) -> bool {
        if field != ToggleField::Liked {
            return false;
        }
        if self.liked != value {
            self.like_count = if value {
                self.like_count.saturating_add(1)
            } else {
                self.like_count.saturating_sub(1)
            };
        }
        self.liked = value;
        true
    }
}

/// A user as listed in search results and follower/following lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCard {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, rename = "firstName")]
    pub first_name: String,
    #[serde(default, rename = "lastName")]
    pub last_name: String,
    #[serde(default)]
    pub pfp: String,
    #[serde(default)]
    pub bio: String,
    /// Ids of the user's posts; used to hydrate the posts carousel.
    #[serde(default)]
    pub posts: Vec<String>,
    #[serde(default)]
    pub num_followers: u32,
    #[serde(default)]
    pub num_following: u32,
    /// Whether the current user follows this user.
    #[serde(default)]
    pub following: bool,
}

impl UserCard {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

impl Identifiable for UserCard {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Toggleable for UserCard {
    fn toggle(&self, field: ToggleField) -> Option<bool> {
        match field {
            ToggleField::Following => Some(self.following),
            _ => None,
        }
    }

    fn set_toggle(&mut self, field: ToggleField, value: bool) -> bool {
        if field != ToggleField::Following {
            return false;
        }
        if self.following != value {
            self.num_followers = if value {
                self.num_followers.saturating_add(1)
            } else {
                self.num_followers.saturating_sub(1)
            };
        }
        self.following = value;
        true
    }
}

/// Notification categories sent by the backend.
///
/// Unknown strings decode to `Other` so new server-side kinds never break a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    /// Pending follow request (private accounts).
    Request,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub from_user: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub liked_post_id: Option<String>,
}

impl Identifiable for Notification {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Toggleable for Notification {
    fn toggle(&self, field: ToggleField) -> Option<bool> {
        match field {
            ToggleField::Read => Some(self.read),
            ToggleField::Accepted => match self.kind {
                NotificationKind::Request => Some(false),
                NotificationKind::Follow => Some(true),
                _ => None,
            },
            _ => None,
        }
    }

    fn set_toggle(&mut self, field: ToggleField, value: bool) -> bool {
        match field {
            ToggleField::Read => {
                self.read = value;
                true
            }
            ToggleField::Accepted => match self.kind {
                NotificationKind::Request | NotificationKind::Follow => {
                    self.kind = if value {
                        NotificationKind::Follow
                    } else {
                        NotificationKind::Request
                    };
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }
}

// ============================================================================
// Mutations
// ============================================================================

/// Who a toggle mutation is addressed to.
///
/// `related` carries the second id some endpoints need: the recipient for
/// mark-read, the requesting user for follow acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationSubject {
    pub item_id: String,
    pub related: Option<String>,
}

impl MutationSubject {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            related: None,
        }
    }

    pub fn with_related(item_id: impl Into<String>, related: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            related: Some(related.into()),
        }
    }
}

/// Per-item mutation endpoints. None of them return a body the client needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationAction {
    Like { post_id: String },
    Unlike { post_id: String },
    Follow { user_id: String },
    Unfollow { user_id: String },
    MarkRead {
        recipient_id: String,
        notification_id: String,
    },
    AcceptFollower { user_id: String },
}

impl MutationAction {
    /// Build the request that moves `field` of `subject` to `value`.
    ///
    /// Returns `None` for one-way fields asked to go backwards (there is no
    /// mark-unread or un-accept endpoint) and for subjects missing a required
    /// related id.
    pub fn for_toggle(field: ToggleField, subject: &MutationSubject, value: bool) -> Option<Self> {
        let id = subject.item_id.clone();
        match (field, value) {
            (ToggleField::Liked, true) => Some(MutationAction::Like { post_id: id }),
            (ToggleField::Liked, false) => Some(MutationAction::Unlike { post_id: id }),
            (ToggleField::Following, true) => Some(MutationAction::Follow { user_id: id }),
            (ToggleField::Following, false) => Some(MutationAction::Unfollow { user_id: id }),
            (ToggleField::Read, true) => Some(MutationAction::MarkRead {
                recipient_id: subject.related.clone()?,
                notification_id: id,
            }),
            (ToggleField::Accepted, true) => Some(MutationAction::AcceptFollower {
                user_id: subject.related.clone()?,
            }),
            (ToggleField::Read, false) | (ToggleField::Accepted, false) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MutationAction::Like { .. } => "like",
            MutationAction::Unlike { .. } => "unlike",
            MutationAction::Follow { .. } => "follow",
            MutationAction::Unfollow { .. } => "unfollow",
            MutationAction::MarkRead { .. } => "mark_read",
            MutationAction::AcceptFollower { .. } => "accept_follower",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_decodes_wire_shape() {
        let json = r#"{
            "_id": "p1",
            "title": "Morning pages",
            "content": "<p>hello</p>",
            "author": "ana",
            "userId": "u1",
            "tags": ["daily"],
            "visibility": "public",
            "imageUrl": "https://img.example/1.png"
        }"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.id, "p1");
        assert_eq!(post.user_id, "u1");
        assert_eq!(post.image_url.as_deref(), Some("https://img.example/1.png"));
        assert!(!post.liked);
        assert_eq!(post.like_count, 0);
    }

    #[test]
    fn test_user_card_decodes_with_missing_fields() {
        let user: UserCard = serde_json::from_str(r#"{"_id": "u9", "username": "zed"}"#).unwrap();
        assert_eq!(user.id, "u9");
        assert_eq!(user.display_name(), "zed");
        assert!(user.posts.is_empty());
    }

    #[test]
    fn test_notification_unknown_kind_is_other() {
        let json = r#"{"_id": "n1", "type": "mention", "read": false}"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.kind, NotificationKind::Other);
        assert_eq!(n.toggle(ToggleField::Accepted), None);
    }

    #[test]
    fn test_notification_created_at_parses_mongo_timestamp() {
        let json = r#"{"_id": "n1", "type": "like", "createdAt": "2024-05-01T10:00:00.000Z"}"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert!(n.created_at.is_some());
    }

    #[test]
    fn test_post_like_toggle_adjusts_count() {
        let mut post: Post = serde_json::from_str(r#"{"_id": "p", "title": "t"}"#).unwrap();
        post.like_count = 4;

        assert!(post.set_toggle(ToggleField::Liked, true));
        assert_eq!(post.like_count, 5);

        // Setting the same value twice does not double count
        post.set_toggle(ToggleField::Liked, true);
        assert_eq!(post.like_count, 5);

        post.set_toggle(ToggleField::Liked, false);
        assert_eq!(post.like_count, 4);
        assert!(!post.set_toggle(ToggleField::Read, true));
    }

    #[test]
    fn test_accept_request_flips_kind() {
        let mut n: Notification =
            serde_json::from_str(r#"{"_id": "n", "type": "request", "fromUser": "u2"}"#).unwrap();
        assert_eq!(n.toggle(ToggleField::Accepted), Some(false));
        assert!(n.set_toggle(ToggleField::Accepted, true));
        assert_eq!(n.kind, NotificationKind::Follow);
    }

    #[test]
    fn test_mutation_for_one_way_fields() {
        let subject = MutationSubject::with_related("n1", "me");
        assert_eq!(
            MutationAction::for_toggle(ToggleField::Read, &subject, true),
            Some(MutationAction::MarkRead {
                recipient_id: "me".into(),
                notification_id: "n1".into()
            })
        );
        assert_eq!(
            MutationAction::for_toggle(ToggleField::Read, &subject, false),
            None
        );

        // Mark-read needs the recipient
        let bare = MutationSubject::new("n1");
        assert_eq!(MutationAction::for_toggle(ToggleField::Read, &bare, true), None);
    }
}
