// src/services/browser.rs

//! Headless browser access for X.
//!
//! Pipelines drive a [`BrowserPage`]; the WebDriver implementation lives
//! behind the `browser` feature so everything else can be tested with
//! scripted pages.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Selector for a rendered post.
pub const TWEET_SELECTOR: &str = r#"article[data-testid="tweet"]"#;

/// Selectors that show the page shell rendered, tried after [`TWEET_SELECTOR`].
pub const SHELL_SELECTORS: &[&str] = &[
    r#"div[data-testid="primaryColumn"]"#,
    r#"main[role="main"]"#,
];

/// A session cookie to install before browsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}

impl SessionCookie {
    /// A secure `.x.com` cookie.
    pub fn x(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: ".x.com".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: true,
        }
    }
}

/// The `auth_token` and `ct0` cookies that make up an X session.
pub fn x_session_cookies(auth_token: &str, ct0: &str) -> Vec<SessionCookie> {
    vec![
        SessionCookie::x("auth_token", auth_token),
        SessionCookie::x("ct0", ct0),
    ]
}

/// One browser tab.
#[async_trait]
pub trait BrowserPage: Send {
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// Wait until `selector` matches, returning `false` on timeout.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool>;

    /// Current rendered HTML.
    async fn html(&mut self) -> Result<String>;

    /// Scroll down by one viewport.
    async fn scroll(&mut self) -> Result<()>;
}

/// Navigate and wait for the page to render.
///
/// Returns `Ok(true)` when posts are visible and `Ok(false)` when only the
/// page shell rendered (an empty timeline or search).
pub async fn load(page: &mut dyn BrowserPage, url: &str, timeout: Duration) -> Result<bool> {
    page.goto(url).await?;
    if page.wait_for(TWEET_SELECTOR, timeout).await? {
        return Ok(true);
    }
    for selector in SHELL_SELECTORS {
        if page.wait_for(selector, Duration::from_secs(3)).await? {
            return Ok(false);
        }
    }
    Err(crate::error::AppError::browser(format!(
        "page did not render: {url}"
    )))
}

#[cfg(feature = "browser")]
pub use webdriver::WebDriverPage;

#[cfg(feature = "browser")]
mod webdriver {
    use std::time::Duration;

    use async_trait::async_trait;
    use fantoccini::cookies::Cookie;
    use fantoccini::{Client, ClientBuilder, Locator};
    use serde_json::json;

    use super::{BrowserPage, SessionCookie};
    use crate::error::Result;

    const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    const CHROME_ARGS: &[&str] = &[
        "--headless=new",
        "--disable-blink-features=AutomationControlled",
        "--disable-dev-shm-usage",
        "--no-sandbox",
        "--window-size=1920,1080",
    ];

    /// A Chrome tab driven through chromedriver.
    pub struct WebDriverPage {
        client: Client,
    }

    impl WebDriverPage {
        /// Start a headless session on the WebDriver at `webdriver_url`.
        pub async fn connect(webdriver_url: &str) -> Result<Self> {
            let mut args: Vec<String> = CHROME_ARGS.iter().map(|a| a.to_string()).collect();
            args.push(format!("--user-agent={DESKTOP_USER_AGENT}"));

            let mut caps = serde_json::Map::new();
            caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

            let mut builder = ClientBuilder::rustls()?;
            builder.capabilities(caps);
            let client = builder.connect(webdriver_url).await?;
            log::info!("Browser session started on {webdriver_url}");
            Ok(Self { client })
        }

        /// Visit `origin` and install the cookies for its domain.
        pub async fn install_cookies(&mut self, origin: &str, cookies: &[SessionCookie]) -> Result<()> {
            self.client.goto(origin).await?;
            for c in cookies {
                let mut cookie = Cookie::new(c.name.clone(), c.value.clone());
                cookie.set_domain(c.domain.clone());
                cookie.set_path(c.path.clone());
                cookie.set_secure(c.secure);
                cookie.set_http_only(c.http_only);
                self.client.add_cookie(cookie).await?;
            }
            log::info!("Installed {} session cookies", cookies.len());
            Ok(())
        }

        pub async fn close(self) -> Result<()> {
            self.client.close().await?;
            Ok(())
        }
    }

    #[async_trait]
    impl BrowserPage for WebDriverPage {
        async fn goto(&mut self, url: &str) -> Result<()> {
            self.client.goto(url).await?;
            Ok(())
        }

        async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool> {
            let found = self
                .client
                .wait()
                .at_most(timeout)
                .for_element(Locator::Css(selector))
                .await;
            if let Err(e) = &found {
                log::debug!("Wait for {selector} ended: {e}");
            }
            Ok(found.is_ok())
        }

        async fn html(&mut self) -> Result<String> {
            Ok(self.client.source().await?)
        }

        async fn scroll(&mut self) -> Result<()> {
            self.client
                .execute("window.scrollBy(0, window.innerHeight);", vec![])
                .await?;
            Ok(())
        }
    }
}
