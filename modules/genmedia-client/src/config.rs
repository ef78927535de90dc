use std::fmt;
use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Everything a [`GenMediaClient`](crate::GenMediaClient) needs. The
/// credential travels here; the client never reads ambient storage.
#[derive(Clone, TypedBuilder)]
pub struct ClientConfig {
    #[builder(setter(into))]
    pub api_key: String,
    #[builder(default = DEFAULT_BASE_URL.to_string(), setter(into))]
    pub base_url: String,
    #[builder(default = DEFAULT_TEXT_MODEL.to_string(), setter(into))]
    pub text_model: String,
    #[builder(default = DEFAULT_IMAGE_MODEL.to_string(), setter(into))]
    pub image_model: String,
    #[builder(default)]
    pub retry: RetryPolicy,
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    pub poll_interval: Duration,
    /// `None` waits for the operation forever.
    #[builder(default = Some(DEFAULT_POLL_TIMEOUT))]
    pub poll_timeout: Option<Duration>,
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub(crate) fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.api_key.chars().take(5).collect();
        f.debug_struct("ClientConfig")
            .field(
                "api_key",
                &format!("{preview}...({} chars)", self.api_key.len()),
            )
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("retry", &self.retry)
            .field("poll_interval", &self.poll_interval)
            .field("poll_timeout", &self.poll_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
