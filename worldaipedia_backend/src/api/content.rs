use super::{deletion_response, write_error, ApiError, ApiResult, AppState};
use crate::auth::{AdminSession, AuthSession, ProSession};
use crate::content::{
    BookInput, CommentInput, CommentView, PostFilter, PostInput, ProductInput,
};
use crate::models::{Book, DonationSettings, Post, Product};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------
// Localized views
//
// With `?lang` the localized fields come back resolved to one string;
// without it the full maps are returned so the admin editor can load
// every language tab at once.

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum PostView {
    Resolved(ResolvedPost),
    Full(Post),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResolvedPost {
    id: String,
    title: String,
    short_description: String,
    long_description: String,
    image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail_image_url_one: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail_image_url_two: Option<String>,
    category: String,
    category_slug: String,
    tags: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    published_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_link: Option<String>,
}

fn post_view(post: Post, lang: Option<&str>) -> PostView {
    match lang {
        Some(lang) => PostView::Resolved(ResolvedPost {
            title: post.title.resolve(lang),
            short_description: post.short_description.resolve(lang),
            long_description: post.long_description.resolve(lang),
            id: post.id,
            image_url: post.image_url,
            detail_image_url_one: post.detail_image_url_one,
            detail_image_url_two: post.detail_image_url_two,
            category: post.category,
            category_slug: post.category_slug,
            tags: post.tags,
            published_at: post.published_at,
            external_link: post.external_link,
        }),
        None => PostView::Full(post),
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum BookView {
    Resolved(ResolvedBook),
    Full(Book),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResolvedBook {
    id: String,
    title: String,
    description: String,
    image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    purchase_link: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
}

fn book_view(book: Book, lang: Option<&str>) -> BookView {
    match lang {
        Some(lang) => BookView::Resolved(ResolvedBook {
            title: book.title.resolve(lang),
            description: book.description.resolve(lang),
            id: book.id,
            image_url: book.image_url,
            purchase_link: book.purchase_link,
            created_at: book.created_at,
        }),
        None => BookView::Full(book),
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum ProductView {
    Resolved(ResolvedProduct),
    Full(Product),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResolvedProduct {
    id: String,
    title: String,
    description: String,
    image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    purchase_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category_slug: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
}

fn product_view(product: Product, lang: Option<&str>) -> ProductView {
    match lang {
        Some(lang) => ProductView::Resolved(ResolvedProduct {
            title: product.title.resolve(lang),
            description: product.description.resolve(lang),
            id: product.id,
            image_url: product.image_url,
            purchase_link: product.purchase_link,
            category: product.category,
            category_slug: product.category_slug,
            created_at: product.created_at,
        }),
        None => ProductView::Full(product),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostListParams {
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LangParam {
    #[serde(default)]
    lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductListParams {
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

// ----------------------------------------------------------------------
// Posts

pub(crate) async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<PostListParams>,
) -> ApiResult<Vec<PostView>> {
    let filter = PostFilter {
        category_slug: params.category,
        tag: params.tag,
    };
    let posts = state.content_service().list_posts(filter)?;
    let lang = params.lang.as_deref();
    Ok(Json(
        posts.into_iter().map(|post| post_view(post, lang)).collect(),
    ))
}

pub(crate) async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<LangParam>,
) -> ApiResult<PostView> {
    let post = state
        .content_service()
        .get_post(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("post {id} not found")))?;
    Ok(Json(post_view(post, params.lang.as_deref())))
}

pub(crate) async fn create_post(
    State(state): State<AppState>,
    _admin: AdminSession,
    Json(payload): Json<PostInput>,
) -> ApiResult<Post> {
    let post = state
        .content_service()
        .create_post(payload)
        .map_err(write_error)?;
    Ok(Json(post))
}

pub(crate) async fn update_post(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<String>,
    Json(payload): Json<PostInput>,
) -> ApiResult<Post> {
    let post = state
        .content_service()
        .update_post(&id, payload)
        .map_err(write_error)?
        .ok_or_else(|| ApiError::NotFound(format!("post {id} not found")))?;
    Ok(Json(post))
}

pub(crate) async fn delete_post(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.content_service().delete_post(&id)? {
        return Err(ApiError::NotFound(format!("post {id} not found")));
    }
    Ok(StatusCode::OK)
}

// ----------------------------------------------------------------------
// Review comments

pub(crate) async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<CommentView>> {
    Ok(Json(state.content_service().list_comments(&id)?))
}

pub(crate) async fn add_comment(
    State(state): State<AppState>,
    ProSession(author): ProSession,
    Path(id): Path<String>,
    Json(payload): Json<CommentInput>,
) -> ApiResult<CommentView> {
    let comment = state
        .content_service()
        .add_comment(&id, &author, payload)
        .map_err(write_error)?
        .ok_or_else(|| ApiError::NotFound(format!("post {id} not found")))?;
    Ok(Json(CommentView::from_comment(comment)))
}

pub(crate) async fn delete_comment(
    State(state): State<AppState>,
    session: AuthSession,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let outcome = state
        .content_service()
        .delete_comment(&post_id, &comment_id, &session.user)?;
    deletion_response(outcome, "comment")
}

// ----------------------------------------------------------------------
// Books

pub(crate) async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<LangParam>,
) -> ApiResult<Vec<BookView>> {
    let books = state.content_service().list_books()?;
    let lang = params.lang.as_deref();
    Ok(Json(
        books.into_iter().map(|book| book_view(book, lang)).collect(),
    ))
}

pub(crate) async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<LangParam>,
) -> ApiResult<BookView> {
    let book = state
        .content_service()
        .get_book(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("book {id} not found")))?;
    Ok(Json(book_view(book, params.lang.as_deref())))
}

pub(crate) async fn create_book(
    State(state): State<AppState>,
    _admin: AdminSession,
    Json(payload): Json<BookInput>,
) -> ApiResult<Book> {
    let book = state
        .content_service()
        .create_book(payload)
        .map_err(write_error)?;
    Ok(Json(book))
}

pub(crate) async fn update_book(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<String>,
    Json(payload): Json<BookInput>,
) -> ApiResult<Book> {
    let book = state
        .content_service()
        .update_book(&id, payload)
        .map_err(write_error)?
        .ok_or_else(|| ApiError::NotFound(format!("book {id} not found")))?;
    Ok(Json(book))
}

pub(crate) async fn delete_book(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.content_service().delete_book(&id)? {
        return Err(ApiError::NotFound(format!("book {id} not found")));
    }
    Ok(StatusCode::OK)
}

// ----------------------------------------------------------------------
// Products

pub(crate) async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ProductListParams>,
) -> ApiResult<Vec<ProductView>> {
    let products = state
        .content_service()
        .list_products(params.category.as_deref())?;
    let lang = params.lang.as_deref();
    Ok(Json(
        products
            .into_iter()
            .map(|product| product_view(product, lang))
            .collect(),
    ))
}

pub(crate) async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<LangParam>,
) -> ApiResult<ProductView> {
    let product = state
        .content_service()
        .get_product(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("product {id} not found")))?;
    Ok(Json(product_view(product, params.lang.as_deref())))
}

pub(crate) async fn create_product(
    State(state): State<AppState>,
    _admin: AdminSession,
    Json(payload): Json<ProductInput>,
) -> ApiResult<Product> {
    let product = state
        .content_service()
        .create_product(payload)
        .map_err(write_error)?;
    Ok(Json(product))
}

pub(crate) async fn update_product(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<String>,
    Json(payload): Json<ProductInput>,
) -> ApiResult<Product> {
    let product = state
        .content_service()
        .update_product(&id, payload)
        .map_err(write_error)?
        .ok_or_else(|| ApiError::NotFound(format!("product {id} not found")))?;
    Ok(Json(product))
}

pub(crate) async fn delete_product(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.content_service().delete_product(&id)? {
        return Err(ApiError::NotFound(format!("product {id} not found")));
    }
    Ok(StatusCode::OK)
}

// ----------------------------------------------------------------------
// Donations

pub(crate) async fn donation_settings(
    State(state): State<AppState>,
) -> ApiResult<DonationSettings> {
    Ok(Json(state.content_service().donation_settings()?))
}

pub(crate) async fn update_donation_settings(
    State(state): State<AppState>,
    _admin: AdminSession,
    Json(payload): Json<DonationSettings>,
) -> ApiResult<DonationSettings> {
    let settings = state
        .content_service()
        .update_donation_settings(payload)
        .map_err(write_error)?;
    Ok(Json(settings))
}
