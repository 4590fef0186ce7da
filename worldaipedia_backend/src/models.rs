//! Stored document types and their collection names.
//!
//! Wire names are camelCase, matching what the site's web client wrote
//! into the document database. Timestamps cross the store as epoch
//! milliseconds (`chrono::serde::ts_milliseconds`).

use crate::localize::LocalizedText;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod collections {
    pub const POSTS: &str = "posts";
    pub const BOOKS: &str = "books";
    pub const PRODUCTS: &str = "products";
    pub const USERS: &str = "users";
    pub const ACCOUNTS: &str = "accounts";
    pub const SESSIONS: &str = "sessions";
    pub const PRO_POSTS: &str = "proPosts";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const SETTINGS: &str = "settings";
    pub const HIGH_SCORES: &str = "highScores";

    /// Document id of the one donation-settings document.
    pub const DONATION_SETTINGS_DOC: &str = "donations";

    pub fn post_comments(post_id: &str) -> String {
        format!("{POSTS}/{post_id}/comments")
    }

    pub fn post_subtree(post_id: &str) -> String {
        format!("{POSTS}/{post_id}")
    }

    pub fn pro_post_comments(pro_post_id: &str) -> String {
        format!("{PRO_POSTS}/{pro_post_id}/comments")
    }

    pub fn pro_comment_replies(pro_post_id: &str, comment_id: &str) -> String {
        format!("{PRO_POSTS}/{pro_post_id}/comments/{comment_id}/replies")
    }

    pub fn pro_post_subtree(pro_post_id: &str) -> String {
        format!("{PRO_POSTS}/{pro_post_id}")
    }
}

/// A blog post reviewing an AI tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: LocalizedText,
    pub short_description: LocalizedText,
    pub long_description: LocalizedText,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_image_url_one: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_image_url_two: Option<String>,
    pub category: String,
    pub category_slug: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_link: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_slug: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// A site member's profile document. The followers/following arrays are
/// kept symmetric by the follow/unfollow batch; `saved` holds ids of
/// saved publications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_subscribed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<SubscriptionPlan>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub member_since: DateTime<Utc>,
    #[serde(default)]
    pub followers: Vec<String>,
    #[serde(default)]
    pub following: Vec<String>,
    #[serde(default)]
    pub saved: Vec<String>,
}

impl User {
    /// Admins hold every PRO entitlement without a subscription.
    pub fn is_pro(&self) -> bool {
        self.is_subscribed || self.is_admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    pub plan_id: String,
    pub plan_name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
}

/// A review comment under a blog post. Author fields are denormalized at
/// write time; views mask them when `is_anonymous` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserComment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    pub rating: u8,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// A PRO member's publication. `like_count` mirrors `likes.len()` and is
/// only ever written alongside it in one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProPost {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProComment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
    pub text: String,
    #[serde(default)]
    pub reply_count: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProReply {
    pub id: String,
    pub post_id: String,
    pub comment_id: String,
    pub author_id: String,
    pub author_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    Reply,
    NewPost,
    Follow,
    Save,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub actor_id: String,
    pub actor_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_avatar: Option<String>,
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Provider links shown on the donation page; one global document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paypal_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patreon_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_me_a_coffee_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_link: Option<String>,
}

/// One document per uid, holding that player's best score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameHighScore {
    pub uid: String,
    pub username: String,
    pub score: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub achieved_at: DateTime<Utc>,
}

/// Credential document, keyed by uid. Never leaves the auth layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub uid: String,
    pub email: String,
    pub password_hash: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Bearer-token session, keyed by the sha-256 digest of the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub uid: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}
