//! Catalog read/query layer and the admin write layer for posts, books,
//! products, post comments, and donation settings.

use crate::config::ContentConfig;
use crate::localize::LocalizedText;
use crate::models::{collections, Book, DonationSettings, Post, Product, User, UserComment};
use crate::store::{Direction, Query, Store};
use crate::utils::slugify;
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Name rendered in place of the author on anonymous comments.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// Outcome of an owner-or-admin delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Denied,
}

#[derive(Clone)]
pub struct ContentService {
    store: Store,
    config: ContentConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInput {
    #[serde(default)]
    pub title: BTreeMap<String, String>,
    #[serde(default)]
    pub short_description: BTreeMap<String, String>,
    #[serde(default)]
    pub long_description: BTreeMap<String, String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub detail_image_one: Option<String>,
    #[serde(default)]
    pub detail_image_two: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub category_slug: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub external_link: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub category_slug: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookInput {
    #[serde(default)]
    pub title: BTreeMap<String, String>,
    #[serde(default)]
    pub description: BTreeMap<String, String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub purchase_link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    #[serde(default)]
    pub title: BTreeMap<String, String>,
    #[serde(default)]
    pub description: BTreeMap<String, String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub purchase_link: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentInput {
    pub text: String,
    pub rating: u8,
    #[serde(default)]
    pub is_anonymous: bool,
}

/// What comment list endpoints return. Anonymous comments mask the
/// author's identity no matter what the stored document carries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    pub is_anonymous: bool,
    pub rating: u8,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl CommentView {
    pub fn from_comment(comment: UserComment) -> Self {
        if comment.is_anonymous {
            Self {
                id: comment.id,
                post_id: comment.post_id,
                user_id: None,
                username: ANONYMOUS_NAME.to_string(),
                profile_image_url: None,
                is_anonymous: true,
                rating: comment.rating,
                text: comment.text,
                created_at: comment.created_at,
            }
        } else {
            Self {
                id: comment.id,
                post_id: comment.post_id,
                user_id: Some(comment.user_id),
                username: comment.username,
                profile_image_url: comment.profile_image_url,
                is_anonymous: false,
                rating: comment.rating,
                text: comment.text,
                created_at: comment.created_at,
            }
        }
    }
}

impl ContentService {
    pub fn new(store: Store, config: ContentConfig) -> Self {
        Self { store, config }
    }

    // ------------------------------------------------------------------
    // Posts

    pub fn list_posts(&self, filter: PostFilter) -> Result<Vec<Post>> {
        let mut query = Query::collection(collections::POSTS)
            .order_by("publishedAt", Direction::Descending);
        if let Some(slug) = &filter.category_slug {
            query = query.filter("categorySlug", slug.as_str());
        }
        let mut posts = Vec::new();
        for doc in self.store.query(query)? {
            posts.push(doc.decode::<Post>()?);
        }
        if let Some(tag) = &filter.tag {
            posts.retain(|post| post.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)));
        }
        Ok(posts)
    }

    pub fn get_post(&self, id: &str) -> Result<Option<Post>> {
        match self.store.get(collections::POSTS, id)? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    pub fn create_post(&self, input: PostInput) -> Result<Post> {
        let post = self.build_post(Uuid::new_v4().to_string(), Utc::now(), input)?;
        self.store
            .set(collections::POSTS, &post.id, serde_json::to_value(&post)?)?;
        Ok(post)
    }

    /// Full replace of the editable fields; id and publish date survive.
    pub fn update_post(&self, id: &str, input: PostInput) -> Result<Option<Post>> {
        let Some(existing) = self.get_post(id)? else {
            return Ok(None);
        };
        let post = self.build_post(existing.id, existing.published_at, input)?;
        self.store
            .set(collections::POSTS, id, serde_json::to_value(&post)?)?;
        Ok(Some(post))
    }

    /// Removes the post and its whole comment subtree.
    pub fn delete_post(&self, id: &str) -> Result<bool> {
        let removed = self.store.delete(collections::POSTS, id)?;
        if removed {
            self.store.delete_prefix(&collections::post_subtree(id))?;
        }
        Ok(removed)
    }

    fn build_post(&self, id: String, published_at: DateTime<Utc>, input: PostInput) -> Result<Post> {
        let title = LocalizedText::from_sparse(&input.title).context("title")?;
        let short_description =
            LocalizedText::from_sparse(&input.short_description).context("shortDescription")?;
        let long_description =
            LocalizedText::from_sparse(&input.long_description).context("longDescription")?;
        let category = input.category.trim().to_string();
        if category.is_empty() {
            bail!("category may not be empty");
        }
        let category_slug = match input.category_slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slugify(slug),
            _ => slugify(&category),
        };
        let image_url = self
            .normalize_image(input.image.as_deref())?
            .unwrap_or_else(|| self.config.placeholder_image_url.clone());
        let tags = input
            .tags
            .iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        Ok(Post {
            id,
            title,
            short_description,
            long_description,
            image_url,
            detail_image_url_one: self.normalize_image(input.detail_image_one.as_deref())?,
            detail_image_url_two: self.normalize_image(input.detail_image_two.as_deref())?,
            category,
            category_slug,
            tags,
            published_at,
            external_link: trimmed_option(input.external_link),
        })
    }

    // ------------------------------------------------------------------
    // Post comments

    pub fn list_comments(&self, post_id: &str) -> Result<Vec<CommentView>> {
        let query = Query::collection(collections::post_comments(post_id))
            .order_by("createdAt", Direction::Descending);
        let mut views = Vec::new();
        for doc in self.store.query(query)? {
            views.push(CommentView::from_comment(doc.decode()?));
        }
        Ok(views)
    }

    /// `None` when the post does not exist. The stored document keeps the
    /// author's real identity; anonymity is applied at view time.
    pub fn add_comment(
        &self,
        post_id: &str,
        author: &User,
        input: CommentInput,
    ) -> Result<Option<UserComment>> {
        if self.get_post(post_id)?.is_none() {
            return Ok(None);
        }
        let text = input.text.trim().to_string();
        if text.is_empty() {
            bail!("comment text may not be empty");
        }
        if !(1..=5).contains(&input.rating) {
            bail!("rating must be between 1 and 5");
        }
        let comment = UserComment {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            user_id: author.uid.clone(),
            username: author.username.clone(),
            profile_image_url: author.photo_url.clone(),
            is_anonymous: input.is_anonymous,
            rating: input.rating,
            text,
            created_at: Utc::now(),
        };
        self.store.set(
            &collections::post_comments(post_id),
            &comment.id,
            serde_json::to_value(&comment)?,
        )?;
        Ok(Some(comment))
    }

    pub fn delete_comment(
        &self,
        post_id: &str,
        comment_id: &str,
        requester: &User,
    ) -> Result<DeleteOutcome> {
        let collection = collections::post_comments(post_id);
        let Some(doc) = self.store.get(&collection, comment_id)? else {
            return Ok(DeleteOutcome::NotFound);
        };
        let comment: UserComment = doc.decode()?;
        if comment.user_id != requester.uid && !requester.is_admin {
            return Ok(DeleteOutcome::Denied);
        }
        self.store.delete(&collection, comment_id)?;
        Ok(DeleteOutcome::Deleted)
    }

    // ------------------------------------------------------------------
    // Books

    pub fn list_books(&self) -> Result<Vec<Book>> {
        let query = Query::collection(collections::BOOKS)
            .order_by("createdAt", Direction::Descending);
        let mut books = Vec::new();
        for doc in self.store.query(query)? {
            books.push(doc.decode::<Book>()?);
        }
        Ok(books)
    }

    pub fn get_book(&self, id: &str) -> Result<Option<Book>> {
        match self.store.get(collections::BOOKS, id)? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    pub fn create_book(&self, input: BookInput) -> Result<Book> {
        let book = self.build_book(Uuid::new_v4().to_string(), Utc::now(), input)?;
        self.store
            .set(collections::BOOKS, &book.id, serde_json::to_value(&book)?)?;
        Ok(book)
    }

    pub fn update_book(&self, id: &str, input: BookInput) -> Result<Option<Book>> {
        let Some(existing) = self.get_book(id)? else {
            return Ok(None);
        };
        let book = self.build_book(existing.id, existing.created_at, input)?;
        self.store
            .set(collections::BOOKS, id, serde_json::to_value(&book)?)?;
        Ok(Some(book))
    }

    pub fn delete_book(&self, id: &str) -> Result<bool> {
        Ok(self.store.delete(collections::BOOKS, id)?)
    }

    fn build_book(&self, id: String, created_at: DateTime<Utc>, input: BookInput) -> Result<Book> {
        let title = LocalizedText::from_sparse(&input.title).context("title")?;
        let description = LocalizedText::from_sparse(&input.description).context("description")?;
        let image_url = self
            .normalize_image(input.image.as_deref())?
            .unwrap_or_else(|| self.config.placeholder_image_url.clone());
        Ok(Book {
            id,
            title,
            description,
            image_url,
            purchase_link: trimmed_option(input.purchase_link),
            created_at,
        })
    }

    // ------------------------------------------------------------------
    // Products

    pub fn list_products(&self, category_slug: Option<&str>) -> Result<Vec<Product>> {
        let mut query = Query::collection(collections::PRODUCTS)
            .order_by("createdAt", Direction::Descending);
        if let Some(slug) = category_slug {
            query = query.filter("categorySlug", slug);
        }
        let mut products = Vec::new();
        for doc in self.store.query(query)? {
            products.push(doc.decode::<Product>()?);
        }
        Ok(products)
    }

    pub fn get_product(&self, id: &str) -> Result<Option<Product>> {
        match self.store.get(collections::PRODUCTS, id)? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    pub fn create_product(&self, input: ProductInput) -> Result<Product> {
        let product = self.build_product(Uuid::new_v4().to_string(), Utc::now(), input)?;
        self.store.set(
            collections::PRODUCTS,
            &product.id,
            serde_json::to_value(&product)?,
        )?;
        Ok(product)
    }

    pub fn update_product(&self, id: &str, input: ProductInput) -> Result<Option<Product>> {
        let Some(existing) = self.get_product(id)? else {
            return Ok(None);
        };
        let product = self.build_product(existing.id, existing.created_at, input)?;
        self.store
            .set(collections::PRODUCTS, id, serde_json::to_value(&product)?)?;
        Ok(Some(product))
    }

    pub fn delete_product(&self, id: &str) -> Result<bool> {
        Ok(self.store.delete(collections::PRODUCTS, id)?)
    }

    fn build_product(
        &self,
        id: String,
        created_at: DateTime<Utc>,
        input: ProductInput,
    ) -> Result<Product> {
        let title = LocalizedText::from_sparse(&input.title).context("title")?;
        let description = LocalizedText::from_sparse(&input.description).context("description")?;
        let image_url = self
            .normalize_image(input.image.as_deref())?
            .unwrap_or_else(|| self.config.placeholder_image_url.clone());
        let category = trimmed_option(input.category);
        let category_slug = category.as_deref().map(slugify);
        Ok(Product {
            id,
            title,
            description,
            image_url,
            purchase_link: trimmed_option(input.purchase_link),
            category,
            category_slug,
            created_at,
        })
    }

    // ------------------------------------------------------------------
    // Donation settings

    pub fn donation_settings(&self) -> Result<DonationSettings> {
        match self
            .store
            .get(collections::SETTINGS, collections::DONATION_SETTINGS_DOC)?
        {
            Some(doc) => Ok(doc.decode()?),
            None => Ok(DonationSettings::default()),
        }
    }

    pub fn update_donation_settings(&self, settings: DonationSettings) -> Result<DonationSettings> {
        self.store.set(
            collections::SETTINGS,
            collections::DONATION_SETTINGS_DOC,
            serde_json::to_value(&settings)?,
        )?;
        Ok(settings)
    }

    // ------------------------------------------------------------------

    /// Accepts an http(s) URL, a site-relative path, or a base64 `data:`
    /// URI. Inline images over the cap degrade to the placeholder URL
    /// instead of failing the write, matching the site's editor behavior.
    fn normalize_image(&self, raw: Option<&str>) -> Result<Option<String>> {
        let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return Ok(None);
        };
        if let Some(rest) = raw.strip_prefix("data:") {
            let Some((_, payload)) = rest.split_once(";base64,") else {
                bail!("unsupported data URI encoding");
            };
            let bytes = BASE64
                .decode(payload.trim())
                .context("invalid base64 image payload")?;
            if bytes.len() > self.config.max_inline_image_bytes {
                tracing::warn!(
                    size = bytes.len(),
                    cap = self.config.max_inline_image_bytes,
                    "inline image exceeds the cap, storing placeholder"
                );
                return Ok(Some(self.config.placeholder_image_url.clone()));
            }
            return Ok(Some(raw.to_string()));
        }
        if raw.starts_with("http://") || raw.starts_with("https://") || raw.starts_with('/') {
            return Ok(Some(raw.to_string()));
        }
        bail!("image must be an http(s) URL or a base64 data URI");
    }
}

fn trimmed_option(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
