use anyhow::{anyhow, Result};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct WorldaiConfig {
    pub api_port: u16,
    pub paths: WorldaiPaths,
    pub admin_emails: Vec<String>,
    pub content: ContentConfig,
    pub media: MediaConfig,
    pub auth: AuthConfig,
    pub assistant: AssistantConfig,
    pub payments: PaymentConfig,
}

impl WorldaiConfig {
    pub fn from_env() -> Result<Self> {
        let paths = WorldaiPaths::discover()?;
        Ok(Self::with_paths(paths))
    }

    pub fn with_paths(paths: WorldaiPaths) -> Self {
        let api_port = env::var("WORLDAIPEDIA_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        let admin_emails = env::var("WORLDAIPEDIA_ADMIN_EMAILS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|part| part.trim().to_ascii_lowercase())
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Self {
            api_port,
            paths,
            admin_emails,
            content: ContentConfig::from_env(),
            media: MediaConfig::from_env(),
            auth: AuthConfig::from_env(),
            assistant: AssistantConfig::from_env(),
            payments: PaymentConfig::from_env(),
        }
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let needle = email.trim().to_ascii_lowercase();
        self.admin_emails.iter().any(|entry| entry == &needle)
    }
}

#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// Upper bound for inline `data:` images; larger payloads fall back to
    /// the placeholder URL instead of failing the write.
    pub max_inline_image_bytes: usize,
    pub placeholder_image_url: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_inline_image_bytes: 1024 * 1024,
            placeholder_image_url: "https://placehold.co/600x400.png".to_string(),
        }
    }
}

impl ContentConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_inline_image_bytes = env::var("WORLDAIPEDIA_MAX_INLINE_IMAGE_BYTES")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(defaults.max_inline_image_bytes);
        let placeholder_image_url = env::var("WORLDAIPEDIA_PLACEHOLDER_IMAGE_URL")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .unwrap_or(defaults.placeholder_image_url);
        Self {
            max_inline_image_bytes,
            placeholder_image_url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Upper bound for uploaded publication images; larger uploads are
    /// rejected, unlike inline post images which degrade.
    pub max_upload_bytes: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

impl MediaConfig {
    pub fn from_env() -> Self {
        let max_upload_bytes = env::var("WORLDAIPEDIA_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(|| Self::default().max_upload_bytes);
        Self { max_upload_bytes }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub session_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24 * 30,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let session_ttl_hours = env::var("WORLDAIPEDIA_SESSION_TTL_HOURS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(|| Self::default().session_ttl_hours);
        Self { session_ttl_hours }
    }
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_url = env::var("WORLDAIPEDIA_AI_API_URL")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .unwrap_or(defaults.api_url);
        let api_key = env::var("WORLDAIPEDIA_AI_API_KEY").unwrap_or_default();
        let model = env::var("WORLDAIPEDIA_AI_MODEL")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .unwrap_or(defaults.model);
        Self {
            api_url,
            api_key,
            model,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub api_url: String,
    pub secret_key: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.stripe.com".to_string(),
            secret_key: String::new(),
        }
    }
}

impl PaymentConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_url = env::var("WORLDAIPEDIA_PAYMENT_API_URL")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .unwrap_or(defaults.api_url);
        let secret_key = env::var("WORLDAIPEDIA_PAYMENT_SECRET_KEY").unwrap_or_default();
        Self {
            api_url,
            secret_key,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorldaiPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
}

impl WorldaiPaths {
    pub fn discover() -> Result<Self> {
        if let Ok(base) = env::var("WORLDAIPEDIA_BASE_DIR") {
            return Self::from_base_dir(base);
        }
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("worldaipedia.db");
        let media_dir = base.join("media");
        Ok(Self {
            base,
            data_dir,
            db_path,
            media_dir,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.media_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_derive_from_base() {
        let paths = WorldaiPaths::from_base_dir("/tmp/wap").unwrap();
        assert_eq!(paths.db_path, PathBuf::from("/tmp/wap/data/worldaipedia.db"));
        assert_eq!(paths.media_dir, PathBuf::from("/tmp/wap/media"));
    }

    #[test]
    fn admin_email_match_is_case_insensitive() {
        let mut config = WorldaiConfig::with_paths(WorldaiPaths::from_base_dir("/tmp/wap").unwrap());
        config.admin_emails = vec!["admin@worldai.example".into()];
        assert!(config.is_admin_email("Admin@WorldAI.example"));
        assert!(!config.is_admin_email("user@worldai.example"));
    }
}
