//! JS-rendering fallback backend: renders the page in a headless browser
//! and returns its rendered DOM in the same cache-entry shape the HTTP
//! backend returns. Used only when the primary backend produced zero
//! evidence and the fallback is enabled — no stealth profile, no resource
//! mirroring, no screenshotting, unlike the teacher's browser pool.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::Browser;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::browser_setup;

use super::{FetchBackend, FetchError, FetchResponse};

/// Owns one headless browser instance, launched lazily on first use and
/// reused for every subsequent fetch in the crawl.
pub struct HeadlessFetcher {
    browser: Mutex<Option<(Arc<Browser>, JoinHandle<()>)>>,
    timeout: Duration,
}

impl HeadlessFetcher {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            browser: Mutex::new(None),
            timeout,
        }
    }

    async fn browser_handle(&self) -> Result<Arc<Browser>, FetchError> {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            let (browser, handler_task, _user_data_dir) = browser_setup::launch_browser()
                .await
                .map_err(|e| FetchError::Backend(e.to_string()))?;
            *guard = Some((Arc::new(browser), handler_task));
        }
        Ok(guard.as_ref().expect("just initialized above").0.clone())
    }

    async fn fetch_one(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let browser = self.browser_handle().await?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Backend(format!("new page: {e}")))?;

        tokio::time::timeout(self.timeout, page.goto(url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        tokio::time::timeout(self.timeout, page.wait_for_navigation())
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let final_url = page
            .url()
            .await
            .map_err(|e| FetchError::Backend(e.to_string()))?
            .unwrap_or_else(|| url.to_string());

        let text = page
            .content()
            .await
            .map_err(|e| FetchError::Backend(e.to_string()))?;

        Ok(FetchResponse {
            final_url,
            status: 200,
            headers: HashMap::new(),
            text,
            content_type: "text/html; charset=utf-8".to_string(),
        })
    }
}

impl FetchBackend for HeadlessFetcher {
    fn get<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<FetchResponse, FetchError>> + Send + 'a>> {
        Box::pin(self.fetch_one(url))
    }
}
