//! Shared helpers and constants.

pub const APP_NAME: &str = "worldaipedia_backend";

/// Public-facing site name, as it appears in assistant prompts and the
/// startup banner.
pub const SITE_NAME: &str = "WorldAIPedia";

pub fn print_banner() {
    println!("{} backend v{}", SITE_NAME, env!("CARGO_PKG_VERSION"));
}

/// Derives a URL-safe slug from a category or tag name. Lowercases,
/// keeps ASCII alphanumerics, folds everything else into single dashes.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Loose shape check for the only address form the site accepts.
pub fn looks_like_email(raw: &str) -> bool {
    let trimmed = raw.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}
