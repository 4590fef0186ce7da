//! PRO publications, their comments and replies, likes, saves, and the
//! follow graph.
//!
//! Every multi-document rule lives in a single write batch: like counts
//! ride the likes array, comment/reply counters ride the insert or
//! delete, and follow/unfollow touches both profile documents at once.
//! No read-then-write increments anywhere.

use crate::content::DeleteOutcome;
use crate::models::{collections, NotificationKind, ProComment, ProPost, ProReply, User};
use crate::notifications::{self, Actor, FanoutJob, NotificationQueue, NotificationService};
use crate::store::{Direction, Query, Store, WriteBatch};
use anyhow::{bail, Result};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

const DEFAULT_FEED_LIMIT: usize = 50;

#[derive(Clone)]
pub struct SocialService {
    store: Store,
    notifications: NotificationService,
    fanout: NotificationQueue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationInput {
    pub text: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl SocialService {
    pub fn new(store: Store, fanout: NotificationQueue) -> Self {
        let notifications = NotificationService::new(store.clone());
        Self {
            store,
            notifications,
            fanout,
        }
    }

    // ------------------------------------------------------------------
    // Publications

    pub fn list_feed(&self, limit: Option<usize>) -> Result<Vec<ProPost>> {
        let query = Query::collection(collections::PRO_POSTS)
            .order_by("createdAt", Direction::Descending)
            .limit(limit.unwrap_or(DEFAULT_FEED_LIMIT));
        self.decode_publications(query)
    }

    pub fn list_by_author(&self, uid: &str) -> Result<Vec<ProPost>> {
        let query = Query::collection(collections::PRO_POSTS)
            .filter("authorId", uid)
            .order_by("createdAt", Direction::Descending);
        self.decode_publications(query)
    }

    pub fn get_publication(&self, id: &str) -> Result<Option<ProPost>> {
        match self.store.get(collections::PRO_POSTS, id)? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Creates the publication and enqueues the follower fan-out; the
    /// caller never waits for notification delivery.
    pub fn create_publication(&self, author: &User, input: PublicationInput) -> Result<ProPost> {
        let text = input.text.trim().to_string();
        if text.is_empty() {
            bail!("publication text may not be empty");
        }
        if let Some(image_url) = input.image_url.as_deref().map(str::trim) {
            if !image_url.is_empty() && !is_link(image_url) {
                bail!("image must be an http(s) URL or a site path");
            }
        }
        let post = ProPost {
            id: Uuid::new_v4().to_string(),
            author_id: author.uid.clone(),
            author_name: author.username.clone(),
            author_avatar: author.photo_url.clone(),
            text,
            image_url: input
                .image_url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            likes: Vec::new(),
            like_count: 0,
            comment_count: 0,
            created_at: Utc::now(),
        };
        self.store.set(
            collections::PRO_POSTS,
            &post.id,
            serde_json::to_value(&post)?,
        )?;
        self.fanout.enqueue(FanoutJob {
            publication_id: post.id.clone(),
            author: Actor::from_user(author),
            snippet: notifications::snippet_of(&post.text),
        });
        Ok(post)
    }

    /// Removes the publication and its comment/reply subtree.
    pub fn delete_publication(&self, id: &str, requester: &User) -> Result<DeleteOutcome> {
        let Some(post) = self.get_publication(id)? else {
            return Ok(DeleteOutcome::NotFound);
        };
        if post.author_id != requester.uid && !requester.is_admin {
            return Ok(DeleteOutcome::Denied);
        }
        self.store.delete(collections::PRO_POSTS, id)?;
        self.store
            .delete_prefix(&collections::pro_post_subtree(id))?;
        Ok(DeleteOutcome::Deleted)
    }

    // ------------------------------------------------------------------
    // Likes and saves

    /// Idempotent per uid: the likes array has set semantics, the
    /// counter is rewritten from the array inside the same batch, and
    /// only the first like notifies the author.
    pub fn like(&self, post_id: &str, actor: &User) -> Result<Option<ProPost>> {
        let Some(post) = self.get_publication(post_id)? else {
            return Ok(None);
        };
        let already_liked = post.likes.contains(&actor.uid);
        let mut batch = WriteBatch::new();
        batch.array_union_counted(
            collections::PRO_POSTS,
            post_id,
            "likes",
            json!(actor.uid),
            "likeCount",
        );
        self.store.commit(batch)?;
        if !already_liked {
            self.notifications.notify(
                &post.author_id,
                &Actor::from_user(actor),
                NotificationKind::Like,
                Some(post_id),
                Some(&notifications::snippet_of(&post.text)),
            )?;
        }
        self.get_publication(post_id)
    }

    pub fn unlike(&self, post_id: &str, actor: &User) -> Result<Option<ProPost>> {
        if self.get_publication(post_id)?.is_none() {
            return Ok(None);
        }
        let mut batch = WriteBatch::new();
        batch.array_remove_counted(
            collections::PRO_POSTS,
            post_id,
            "likes",
            json!(actor.uid),
            "likeCount",
        );
        self.store.commit(batch)?;
        self.get_publication(post_id)
    }

    /// Adds the publication to the caller's saved list and notifies the
    /// author on the first save only. Returns the refreshed caller
    /// profile.
    pub fn save(&self, post_id: &str, actor: &User) -> Result<Option<User>> {
        let Some(post) = self.get_publication(post_id)? else {
            return Ok(None);
        };
        let already_saved = self
            .get_user(&actor.uid)?
            .map(|me| me.saved.iter().any(|id| id == post_id))
            .unwrap_or(false);
        let mut batch = WriteBatch::new();
        batch.array_union(collections::USERS, &actor.uid, "saved", json!(post_id));
        self.store.commit(batch)?;
        if !already_saved {
            self.notifications.notify(
                &post.author_id,
                &Actor::from_user(actor),
                NotificationKind::Save,
                Some(post_id),
                Some(&notifications::snippet_of(&post.text)),
            )?;
        }
        self.get_user(&actor.uid)
    }

    /// Removes the publication from the caller's saved list. No
    /// existence check here: deleting a publication leaves stale ids in
    /// saved lists, and those must stay clearable.
    pub fn unsave(&self, post_id: &str, actor: &User) -> Result<Option<User>> {
        let mut batch = WriteBatch::new();
        batch.array_remove(collections::USERS, &actor.uid, "saved", json!(post_id));
        self.store.commit(batch)?;
        self.get_user(&actor.uid)
    }

    // ------------------------------------------------------------------
    // Comments and replies

    pub fn list_comments(&self, post_id: &str) -> Result<Vec<ProComment>> {
        let query = Query::collection(collections::pro_post_comments(post_id))
            .order_by("createdAt", Direction::Ascending);
        let mut comments = Vec::new();
        for doc in self.store.query(query)? {
            comments.push(doc.decode::<ProComment>()?);
        }
        Ok(comments)
    }

    /// Comment insert and parent counter move in one batch.
    pub fn add_comment(&self, post_id: &str, author: &User, text: &str) -> Result<Option<ProComment>> {
        let Some(post) = self.get_publication(post_id)? else {
            return Ok(None);
        };
        let text = text.trim().to_string();
        if text.is_empty() {
            bail!("comment text may not be empty");
        }
        let comment = ProComment {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            author_id: author.uid.clone(),
            author_name: author.username.clone(),
            author_avatar: author.photo_url.clone(),
            text,
            reply_count: 0,
            created_at: Utc::now(),
        };
        let mut batch = WriteBatch::new();
        batch
            .set(
                collections::pro_post_comments(post_id),
                &comment.id,
                serde_json::to_value(&comment)?,
            )
            .increment(collections::PRO_POSTS, post_id, "commentCount", 1);
        self.store.commit(batch)?;
        self.notifications.notify(
            &post.author_id,
            &Actor::from_user(author),
            NotificationKind::Comment,
            Some(post_id),
            Some(&notifications::snippet_of(&comment.text)),
        )?;
        Ok(Some(comment))
    }

    /// The counter only ever decreases here, in the same batch as the
    /// delete. Replies under the comment go with it.
    pub fn delete_comment(
        &self,
        post_id: &str,
        comment_id: &str,
        requester: &User,
    ) -> Result<DeleteOutcome> {
        let collection = collections::pro_post_comments(post_id);
        let Some(doc) = self.store.get(&collection, comment_id)? else {
            return Ok(DeleteOutcome::NotFound);
        };
        let comment: ProComment = doc.decode()?;
        if comment.author_id != requester.uid && !requester.is_admin {
            return Ok(DeleteOutcome::Denied);
        }
        let mut batch = WriteBatch::new();
        batch
            .delete(&collection, comment_id)
            .increment(collections::PRO_POSTS, post_id, "commentCount", -1);
        self.store.commit(batch)?;
        self.store.delete_prefix(&format!("{collection}/{comment_id}"))?;
        Ok(DeleteOutcome::Deleted)
    }

    pub fn list_replies(&self, post_id: &str, comment_id: &str) -> Result<Vec<ProReply>> {
        let query = Query::collection(collections::pro_comment_replies(post_id, comment_id))
            .order_by("createdAt", Direction::Ascending);
        let mut replies = Vec::new();
        for doc in self.store.query(query)? {
            replies.push(doc.decode::<ProReply>()?);
        }
        Ok(replies)
    }

    pub fn add_reply(
        &self,
        post_id: &str,
        comment_id: &str,
        author: &User,
        text: &str,
    ) -> Result<Option<ProReply>> {
        let comments = collections::pro_post_comments(post_id);
        let Some(doc) = self.store.get(&comments, comment_id)? else {
            return Ok(None);
        };
        let parent: ProComment = doc.decode()?;
        let text = text.trim().to_string();
        if text.is_empty() {
            bail!("reply text may not be empty");
        }
        let reply = ProReply {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            comment_id: comment_id.to_string(),
            author_id: author.uid.clone(),
            author_name: author.username.clone(),
            author_avatar: author.photo_url.clone(),
            text,
            created_at: Utc::now(),
        };
        let mut batch = WriteBatch::new();
        batch
            .set(
                collections::pro_comment_replies(post_id, comment_id),
                &reply.id,
                serde_json::to_value(&reply)?,
            )
            .increment(&comments, comment_id, "replyCount", 1);
        self.store.commit(batch)?;
        self.notifications.notify(
            &parent.author_id,
            &Actor::from_user(author),
            NotificationKind::Reply,
            Some(post_id),
            Some(&notifications::snippet_of(&reply.text)),
        )?;
        Ok(Some(reply))
    }

    pub fn delete_reply(
        &self,
        post_id: &str,
        comment_id: &str,
        reply_id: &str,
        requester: &User,
    ) -> Result<DeleteOutcome> {
        let collection = collections::pro_comment_replies(post_id, comment_id);
        let Some(doc) = self.store.get(&collection, reply_id)? else {
            return Ok(DeleteOutcome::NotFound);
        };
        let reply: ProReply = doc.decode()?;
        if reply.author_id != requester.uid && !requester.is_admin {
            return Ok(DeleteOutcome::Denied);
        }
        let mut batch = WriteBatch::new();
        batch
            .delete(&collection, reply_id)
            .increment(
                &collections::pro_post_comments(post_id),
                comment_id,
                "replyCount",
                -1,
            );
        self.store.commit(batch)?;
        Ok(DeleteOutcome::Deleted)
    }

    // ------------------------------------------------------------------
    // Follow graph

    /// One batch touches both sides, so the symmetric invariant is never
    /// observable half-applied. Only a fresh follow notifies the
    /// followee. Returns the refreshed followee.
    pub fn follow(&self, follower: &User, followee_uid: &str) -> Result<Option<User>> {
        if follower.uid == followee_uid {
            bail!("cannot follow yourself");
        }
        let Some(followee) = self.get_user(followee_uid)? else {
            return Ok(None);
        };
        let already_following = followee.followers.contains(&follower.uid);
        let mut batch = WriteBatch::new();
        batch
            .array_union(
                collections::USERS,
                &follower.uid,
                "following",
                json!(followee_uid),
            )
            .array_union(
                collections::USERS,
                followee_uid,
                "followers",
                json!(follower.uid),
            );
        self.store.commit(batch)?;
        if !already_following {
            self.notifications.notify(
                &followee.uid,
                &Actor::from_user(follower),
                NotificationKind::Follow,
                None,
                None,
            )?;
        }
        self.get_user(followee_uid)
    }

    pub fn unfollow(&self, follower: &User, followee_uid: &str) -> Result<Option<User>> {
        if follower.uid == followee_uid {
            bail!("cannot unfollow yourself");
        }
        if self.get_user(followee_uid)?.is_none() {
            return Ok(None);
        }
        let mut batch = WriteBatch::new();
        batch
            .array_remove(
                collections::USERS,
                &follower.uid,
                "following",
                json!(followee_uid),
            )
            .array_remove(
                collections::USERS,
                followee_uid,
                "followers",
                json!(follower.uid),
            );
        self.store.commit(batch)?;
        self.get_user(followee_uid)
    }

    fn get_user(&self, uid: &str) -> Result<Option<User>> {
        match self.store.get(collections::USERS, uid)? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    fn decode_publications(&self, query: Query) -> Result<Vec<ProPost>> {
        let mut posts = Vec::new();
        for doc in self.store.query(query)? {
            posts.push(doc.decode::<ProPost>()?);
        }
        Ok(posts)
    }
}

fn is_link(raw: &str) -> bool {
    raw.starts_with("http://") || raw.starts_with("https://") || raw.starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::spawn_fanout_worker;
    use chrono::TimeZone;

    fn user(uid: &str) -> User {
        User {
            uid: uid.into(),
            email: format!("{uid}@example.com"),
            username: uid.into(),
            display_name: uid.into(),
            photo_url: None,
            description: String::new(),
            is_admin: false,
            is_subscribed: true,
            plan: None,
            member_since: Utc.timestamp_millis_opt(0).unwrap(),
            followers: vec![],
            following: vec![],
            saved: vec![],
        }
    }

    fn seed_profile(store: &Store, who: &User) {
        store
            .set(
                collections::USERS,
                &who.uid,
                serde_json::to_value(who).unwrap(),
            )
            .unwrap();
    }

    async fn setup() -> (SocialService, Store) {
        let store = Store::in_memory().expect("store");
        let queue = spawn_fanout_worker(store.clone());
        (SocialService::new(store.clone(), queue), store)
    }

    #[tokio::test]
    async fn like_count_always_mirrors_likes_len() {
        let (service, _store) = setup().await;
        let author = user("author");
        seed_profile(&_store, &author);
        let post = service
            .create_publication(
                &author,
                PublicationInput {
                    text: "Fresh drop".into(),
                    image_url: None,
                },
            )
            .unwrap();

        let u1 = user("u1");
        let u2 = user("u2");
        // Repeat likes by the same uid are no-ops.
        for _ in 0..3 {
            service.like(&post.id, &u1).unwrap().unwrap();
        }
        let state = service.like(&post.id, &u2).unwrap().unwrap();
        assert_eq!(state.likes.len(), 2);
        assert_eq!(state.like_count, 2);

        let state = service.unlike(&post.id, &u1).unwrap().unwrap();
        assert_eq!(state.likes, vec!["u2".to_string()]);
        assert_eq!(state.like_count, 1);

        // Unliking something never liked is harmless.
        let state = service.unlike(&post.id, &user("u9")).unwrap().unwrap();
        assert_eq!(state.like_count, 1);

        assert!(service.like("missing", &u1).unwrap().is_none());
    }

    #[tokio::test]
    async fn comment_and_reply_counters_move_with_inserts_and_deletes() {
        let (service, _store) = setup().await;
        let author = user("author");
        seed_profile(&_store, &author);
        let commenter = user("commenter");
        let post = service
            .create_publication(
                &author,
                PublicationInput {
                    text: "Discuss".into(),
                    image_url: None,
                },
            )
            .unwrap();

        let comment = service
            .add_comment(&post.id, &commenter, "First!")
            .unwrap()
            .unwrap();
        assert_eq!(
            service.get_publication(&post.id).unwrap().unwrap().comment_count,
            1
        );

        let reply = service
            .add_reply(&post.id, &comment.id, &author, "Welcome")
            .unwrap()
            .unwrap();
        let comments = service.list_comments(&post.id).unwrap();
        assert_eq!(comments[0].reply_count, 1);
        assert_eq!(service.list_replies(&post.id, &comment.id).unwrap().len(), 1);

        assert_eq!(
            service
                .delete_reply(&post.id, &comment.id, &reply.id, &author)
                .unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(service.list_comments(&post.id).unwrap()[0].reply_count, 0);

        assert_eq!(
            service.delete_comment(&post.id, &comment.id, &commenter).unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            service.get_publication(&post.id).unwrap().unwrap().comment_count,
            0
        );
        // Reply subtree went with the comment.
        assert!(service.list_replies(&post.id, &comment.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn comment_delete_rights_are_owner_or_admin() {
        let (service, store) = setup().await;
        let author = user("author");
        seed_profile(&store, &author);
        let post = service
            .create_publication(
                &author,
                PublicationInput {
                    text: "Post".into(),
                    image_url: None,
                },
            )
            .unwrap();
        let comment = service
            .add_comment(&post.id, &user("commenter"), "Hi")
            .unwrap()
            .unwrap();

        assert_eq!(
            service
                .delete_comment(&post.id, &comment.id, &user("stranger"))
                .unwrap(),
            DeleteOutcome::Denied
        );
        let mut admin = user("admin");
        admin.is_admin = true;
        assert_eq!(
            service.delete_comment(&post.id, &comment.id, &admin).unwrap(),
            DeleteOutcome::Deleted
        );
    }

    #[tokio::test]
    async fn follow_unfollow_round_trips_restore_both_arrays() {
        let (service, store) = setup().await;
        let ada = user("ada");
        let grace = user("grace");
        seed_profile(&store, &ada);
        seed_profile(&store, &grace);

        for _ in 0..3 {
            service.follow(&ada, "grace").unwrap().unwrap();
            service.unfollow(&ada, "grace").unwrap().unwrap();
        }
        let grace_doc = service.get_user("grace").unwrap().unwrap();
        let ada_doc = service.get_user("ada").unwrap().unwrap();
        assert!(grace_doc.followers.is_empty());
        assert!(ada_doc.following.is_empty());

        let grace_doc = service.follow(&ada, "grace").unwrap().unwrap();
        assert_eq!(grace_doc.followers, vec!["ada".to_string()]);
        assert_eq!(
            service.get_user("ada").unwrap().unwrap().following,
            vec!["grace".to_string()]
        );

        assert!(service.follow(&ada, "ada").is_err());
        assert!(service.follow(&ada, "nobody").unwrap().is_none());
    }

    #[tokio::test]
    async fn save_tracks_membership_and_notifies_author() {
        let (service, store) = setup().await;
        let author = user("author");
        let reader = user("reader");
        seed_profile(&store, &author);
        seed_profile(&store, &reader);
        let post = service
            .create_publication(
                &author,
                PublicationInput {
                    text: "Keep this".into(),
                    image_url: None,
                },
            )
            .unwrap();

        let me = service.save(&post.id, &reader).unwrap().unwrap();
        assert_eq!(me.saved, vec![post.id.clone()]);
        // Saving twice stays a single entry.
        let me = service.save(&post.id, &reader).unwrap().unwrap();
        assert_eq!(me.saved.len(), 1);

        let notifications = NotificationService::new(store.clone())
            .list_for("author")
            .unwrap();
        assert!(notifications
            .iter()
            .any(|n| n.kind == NotificationKind::Save && n.actor_id == "reader"));

        let me = service.unsave(&post.id, &reader).unwrap().unwrap();
        assert!(me.saved.is_empty());

        // Stale saved ids survive publication deletion and must still
        // clear.
        service.save(&post.id, &reader).unwrap().unwrap();
        service.delete_publication(&post.id, &author).unwrap();
        let me = service.unsave(&post.id, &reader).unwrap().unwrap();
        assert!(me.saved.is_empty());
    }

    #[tokio::test]
    async fn repeat_engagement_notifies_the_author_once() {
        let (service, store) = setup().await;
        let author = user("author");
        let fan = user("fan");
        seed_profile(&store, &author);
        seed_profile(&store, &fan);
        let post = service
            .create_publication(
                &author,
                PublicationInput {
                    text: "React".into(),
                    image_url: None,
                },
            )
            .unwrap();

        for _ in 0..3 {
            service.like(&post.id, &fan).unwrap().unwrap();
        }
        for _ in 0..2 {
            service.save(&post.id, &fan).unwrap().unwrap();
        }
        for _ in 0..2 {
            service.follow(&fan, "author").unwrap().unwrap();
        }

        let count_kind = |kind: NotificationKind| {
            NotificationService::new(store.clone())
                .list_for("author")
                .unwrap()
                .iter()
                .filter(|n| n.kind == kind)
                .count()
        };
        assert_eq!(count_kind(NotificationKind::Like), 1);
        assert_eq!(count_kind(NotificationKind::Save), 1);
        assert_eq!(count_kind(NotificationKind::Follow), 1);

        // Unlike then like again is a fresh engagement.
        service.unlike(&post.id, &fan).unwrap().unwrap();
        service.like(&post.id, &fan).unwrap().unwrap();
        assert_eq!(count_kind(NotificationKind::Like), 2);
    }

    #[tokio::test]
    async fn publication_delete_clears_subtree_and_checks_rights() {
        let (service, store) = setup().await;
        let author = user("author");
        seed_profile(&store, &author);
        let post = service
            .create_publication(
                &author,
                PublicationInput {
                    text: "Temp".into(),
                    image_url: None,
                },
            )
            .unwrap();
        let comment = service
            .add_comment(&post.id, &user("c"), "hello")
            .unwrap()
            .unwrap();
        service
            .add_reply(&post.id, &comment.id, &user("r"), "yo")
            .unwrap()
            .unwrap();

        assert_eq!(
            service.delete_publication(&post.id, &user("stranger")).unwrap(),
            DeleteOutcome::Denied
        );
        assert_eq!(
            service.delete_publication(&post.id, &author).unwrap(),
            DeleteOutcome::Deleted
        );
        assert!(service.get_publication(&post.id).unwrap().is_none());
        assert!(service.list_comments(&post.id).unwrap().is_empty());
        assert!(service.list_replies(&post.id, &comment.id).unwrap().is_empty());
        assert_eq!(
            service.delete_publication(&post.id, &author).unwrap(),
            DeleteOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn feed_is_newest_first_and_respects_limit() {
        let (service, store) = setup().await;
        let author = user("author");
        seed_profile(&store, &author);
        for text in ["one", "two", "three"] {
            service
                .create_publication(
                    &author,
                    PublicationInput {
                        text: text.into(),
                        image_url: None,
                    },
                )
                .unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let feed = service.list_feed(Some(2)).unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].text, "three");
        assert_eq!(feed[1].text, "two");

        let by_author = service.list_by_author("author").unwrap();
        assert_eq!(by_author.len(), 3);
    }
}
