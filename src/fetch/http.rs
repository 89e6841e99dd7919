//! Primary fetch backend: a plain HTTP client over `reqwest`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::{FetchBackend, FetchError, FetchResponse};

pub struct HttpFetcher {
    client: reqwest::Client,
    max_content_bytes: u64,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration, max_redirects: usize, max_content_bytes: u64) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            max_content_bytes,
        }
    }

    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(Duration::default())
                } else {
                    FetchError::Transport(e.to_string())
                }
            })?;

        let final_url = response.url().to_string();
        let status = response.status().as_u16();

        if status != 200 {
            return Err(FetchError::HttpStatus(status));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if !content_type.contains("text/html") {
            return Err(FetchError::NonHtmlContentType(content_type));
        }

        if let Some(len) = response.content_length()
            && len > self.max_content_bytes
        {
            return Err(FetchError::TooLarge {
                limit: self.max_content_bytes,
            });
        }

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
            }
        }

        let text = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if text.len() as u64 > self.max_content_bytes {
            return Err(FetchError::TooLarge {
                limit: self.max_content_bytes,
            });
        }

        Ok(FetchResponse {
            final_url,
            status,
            headers,
            text,
            content_type,
        })
    }
}

impl FetchBackend for HttpFetcher {
    fn get<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<FetchResponse, FetchError>> + Send + 'a>> {
        Box::pin(self.fetch(url))
    }
}
