//! User profile documents: lazy creation, lookup and search, profile
//! edits with the username fan-out, and the subscription flag.

use crate::models::{collections, SubscriptionPlan, User};
use crate::store::{Query, Store};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

const SEARCH_RESULT_CAP: usize = 20;

#[derive(Clone)]
pub struct AccountService {
    store: Store,
    admin_emails: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Public profile shape: no email, no saved list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub uid: String,
    pub username: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub description: String,
    pub is_subscribed: bool,
    pub follower_count: usize,
    pub following_count: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub member_since: DateTime<Utc>,
}

impl UserView {
    pub fn from_user(user: &User) -> Self {
        Self {
            uid: user.uid.clone(),
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            photo_url: user.photo_url.clone(),
            description: user.description.clone(),
            is_subscribed: user.is_subscribed,
            follower_count: user.followers.len(),
            following_count: user.following.len(),
            member_since: user.member_since,
        }
    }
}

impl AccountService {
    pub fn new(store: Store, admin_emails: Vec<String>) -> Self {
        Self {
            store,
            admin_emails,
        }
    }

    /// Creates the profile document on first sign-in and returns it on
    /// every later call. The admin flag comes from the configured email
    /// list; `member_since` is stamped exactly once.
    pub fn ensure_user(&self, uid: &str, email: &str, username_hint: Option<&str>) -> Result<User> {
        if let Some(existing) = self.get_user(uid)? {
            return Ok(existing);
        }
        let email = email.trim().to_ascii_lowercase();
        let username = username_hint
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| email.split('@').next().unwrap_or("member").to_string());
        let user = User {
            uid: uid.to_string(),
            is_admin: self.admin_emails.iter().any(|entry| entry == &email),
            email,
            display_name: username.clone(),
            username,
            photo_url: None,
            description: String::new(),
            is_subscribed: false,
            plan: None,
            member_since: Utc::now(),
            followers: Vec::new(),
            following: Vec::new(),
            saved: Vec::new(),
        };
        self.store
            .set(collections::USERS, uid, serde_json::to_value(&user)?)?;
        Ok(user)
    }

    pub fn get_user(&self, uid: &str) -> Result<Option<User>> {
        match self.store.get(collections::USERS, uid)? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Case-insensitive username-contains search, capped. A full scan is
    /// fine at this site's member count.
    pub fn search_users(&self, fragment: &str) -> Result<Vec<UserView>> {
        let needle = fragment.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let mut views = Vec::new();
        for doc in self.store.query(Query::collection(collections::USERS))? {
            let user: User = doc.decode()?;
            if user.username.to_lowercase().contains(&needle)
                || user.display_name.to_lowercase().contains(&needle)
            {
                views.push(UserView::from_user(&user));
                if views.len() == SEARCH_RESULT_CAP {
                    break;
                }
            }
        }
        Ok(views)
    }

    /// Applies the provided profile fields. A username change also
    /// rewrites the denormalized author name on every publication the
    /// user authored: one update per document, no transaction, failures
    /// logged and skipped.
    pub fn update_profile(&self, uid: &str, input: ProfileInput) -> Result<Option<User>> {
        let Some(mut user) = self.get_user(uid)? else {
            return Ok(None);
        };

        if let Some(display_name) = trimmed(input.display_name) {
            user.display_name = display_name;
        }
        if let Some(description) = input.description {
            user.description = description.trim().to_string();
        }
        if let Some(photo_url) = trimmed(input.photo_url) {
            if !is_link(&photo_url) {
                bail!("photo must be an http(s) URL or a site path");
            }
            user.photo_url = Some(photo_url);
        }

        let mut renamed = false;
        if let Some(username) = trimmed(input.username) {
            if username != user.username {
                user.username = username;
                renamed = true;
            }
        }

        self.store
            .set(collections::USERS, uid, serde_json::to_value(&user)?)?;
        if renamed {
            self.rewrite_author_name(uid, &user.username)?;
        }
        Ok(Some(user))
    }

    pub fn set_subscription(&self, uid: &str, plan_id: &str, plan_name: &str) -> Result<Option<User>> {
        if self.get_user(uid)?.is_none() {
            return Ok(None);
        }
        let plan = SubscriptionPlan {
            plan_id: plan_id.to_string(),
            plan_name: plan_name.to_string(),
            started_at: Utc::now(),
        };
        self.store.update(
            collections::USERS,
            uid,
            json!({ "isSubscribed": true, "plan": serde_json::to_value(&plan)? }),
        )?;
        self.get_user(uid)
    }

    pub fn clear_subscription(&self, uid: &str) -> Result<Option<User>> {
        if self.get_user(uid)?.is_none() {
            return Ok(None);
        }
        self.store.update(
            collections::USERS,
            uid,
            json!({ "isSubscribed": false, "plan": null }),
        )?;
        self.get_user(uid)
    }

    fn rewrite_author_name(&self, uid: &str, username: &str) -> Result<()> {
        let query = Query::collection(collections::PRO_POSTS).filter("authorId", uid);
        for doc in self.store.query(query)? {
            let result = self.store.update(
                collections::PRO_POSTS,
                &doc.id,
                json!({ "authorName": username }),
            );
            if let Err(err) = result {
                tracing::warn!(
                    publication = %doc.id,
                    error = %err,
                    "username fan-out skipped a publication"
                );
            }
        }
        Ok(())
    }
}

fn trimmed(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn is_link(raw: &str) -> bool {
    raw.starts_with("http://") || raw.starts_with("https://") || raw.starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup_service() -> AccountService {
        AccountService::new(
            Store::in_memory().expect("store"),
            vec!["admin@worldai.example".into()],
        )
    }

    #[test]
    fn ensure_user_creates_once_and_flags_admins() {
        let service = setup_service();
        let user = service
            .ensure_user("u1", "Admin@WorldAI.example", None)
            .unwrap();
        assert!(user.is_admin);
        assert_eq!(user.username, "admin");

        let again = service
            .ensure_user("u1", "admin@worldai.example", Some("other"))
            .unwrap();
        assert_eq!(again.username, "admin");
        assert_eq!(again.member_since, user.member_since);

        let member = service
            .ensure_user("u2", "ada@example.com", Some("ada_l"))
            .unwrap();
        assert!(!member.is_admin);
        assert_eq!(member.username, "ada_l");
    }

    #[test]
    fn search_matches_username_or_display_name() {
        let service = setup_service();
        service.ensure_user("u1", "ada@example.com", Some("ada_l")).unwrap();
        service.ensure_user("u2", "grace@example.com", Some("ghopper")).unwrap();
        service
            .update_profile(
                "u2",
                ProfileInput {
                    display_name: Some("Grace Hopper".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(service.search_users("ADA").unwrap().len(), 1);
        assert_eq!(service.search_users("hopper").unwrap().len(), 1);
        assert!(service.search_users("  ").unwrap().is_empty());
    }

    #[test]
    fn username_change_fans_out_to_publications() {
        let service = setup_service();
        let store = service.store.clone();
        service.ensure_user("u1", "ada@example.com", Some("ada")).unwrap();
        for id in ["pp1", "pp2"] {
            store
                .set(
                    collections::PRO_POSTS,
                    id,
                    json!({"id": id, "authorId": "u1", "authorName": "ada"}),
                )
                .unwrap();
        }
        store
            .set(
                collections::PRO_POSTS,
                "other",
                json!({"id": "other", "authorId": "u9", "authorName": "someone"}),
            )
            .unwrap();

        service
            .update_profile(
                "u1",
                ProfileInput {
                    username: Some("ada_lovelace".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        for id in ["pp1", "pp2"] {
            let doc = store.get(collections::PRO_POSTS, id).unwrap().unwrap();
            assert_eq!(doc.body["authorName"], "ada_lovelace");
        }
        let untouched = store.get(collections::PRO_POSTS, "other").unwrap().unwrap();
        assert_eq!(untouched.body["authorName"], "someone");
    }

    #[test]
    fn subscription_round_trip() {
        let service = setup_service();
        service.ensure_user("u1", "ada@example.com", None).unwrap();
        let user = service
            .set_subscription("u1", "pro-monthly", "PRO Monthly")
            .unwrap()
            .unwrap();
        assert!(user.is_subscribed);
        assert_eq!(user.plan.as_ref().unwrap().plan_id, "pro-monthly");

        let user = service.clear_subscription("u1").unwrap().unwrap();
        assert!(!user.is_subscribed);
        assert!(user.plan.is_none());

        assert!(service.set_subscription("ghost", "p", "P").unwrap().is_none());
    }

    #[test]
    fn invalid_photo_url_is_rejected() {
        let service = setup_service();
        service.ensure_user("u1", "ada@example.com", None).unwrap();
        let result = service.update_profile(
            "u1",
            ProfileInput {
                photo_url: Some("ftp://nope".into()),
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }
}
