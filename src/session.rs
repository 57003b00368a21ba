//! One-time login and the authenticated session built from it.
//!
//! A real browser drives the login form once at startup. The cookies it ends
//! up with become the [`Session`], which is read-only afterwards and shared by
//! the lightweight HTTP client and every browser instance opened later.
//! There is no refresh: an expired session needs a restart.

use crate::browser::{BrowserHandle, BrowserSettings};
use crate::error::{Error, Result};
use crate::site::{LOGIN_PASS_FIELD, LOGIN_SUBMIT, LOGIN_URL, LOGIN_USER_FIELD, SITE_ROOT};
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam};
use reqwest::cookie::Jar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};
use url::Url;

/// Login credentials.
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Both values are required; a missing or blank one is an
    /// authentication failure.
    pub fn new(username: Option<String>, password: Option<String>) -> Result<Self> {
        let username = username
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| Error::Authentication("username is not configured".to_string()))?;
        let password = password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::Authentication("password is not configured".to_string()))?;
        Ok(Self { username, password })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A cookie harvested from the logged-in browser.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Seconds since the epoch; `None` for session cookies.
    pub expires: Option<f64>,
}

impl From<Cookie> for SessionCookie {
    fn from(cookie: Cookie) -> Self {
        Self {
            expires: (!cookie.session).then_some(cookie.expires),
            name: cookie.name,
            value: cookie.value,
            domain: cookie.domain,
            path: cookie.path,
            secure: cookie.secure,
            http_only: cookie.http_only,
        }
    }
}

impl SessionCookie {
    /// Copy of the cookie without its expiry, which the browser refuses on
    /// injection.
    pub fn without_expiry(&self) -> Self {
        Self {
            expires: None,
            ..self.clone()
        }
    }

    /// `Set-Cookie` style line for the HTTP client's jar.
    fn set_cookie_line(&self) -> String {
        format!("{}={}; Domain={}; Path={}", self.name, self.value, self.domain, self.path)
    }

    /// URL the cookie is scoped to.
    fn scope_url(&self) -> Option<Url> {
        let host = self.domain.trim_start_matches('.');
        let path = if self.path.is_empty() { "/" } else { &self.path };
        Url::parse(&format!("https://{}{}", host, path)).ok()
    }

    fn to_param(&self) -> Result<CookieParam> {
        CookieParam::builder()
            .name(self.name.clone())
            .value(self.value.clone())
            .domain(self.domain.clone())
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only)
            .build()
            .map_err(Error::Launch)
    }
}

/// The authenticated fetch context.
#[derive(Debug, Clone)]
pub struct Session {
    cookies: Vec<SessionCookie>,
    browser: BrowserSettings,
}

impl Session {
    pub fn new(cookies: Vec<SessionCookie>, browser: BrowserSettings) -> Self {
        Self { cookies, browser }
    }

    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    pub fn browser_settings(&self) -> &BrowserSettings {
        &self.browser
    }

    /// The cookies as they are injected into a fresh browser: expiry removed.
    pub fn replay_cookies(&self) -> Vec<SessionCookie> {
        self.cookies.iter().map(SessionCookie::without_expiry).collect()
    }

    /// A cookie jar holding every session cookie.
    pub fn cookie_jar(&self) -> Arc<Jar> {
        let jar = Jar::default();
        for cookie in &self.cookies {
            match cookie.scope_url() {
                Some(url) => jar.add_cookie_str(&cookie.set_cookie_line(), &url),
                None => warn!(name = %cookie.name, domain = %cookie.domain, "Skipping cookie with unusable domain"),
            }
        }
        Arc::new(jar)
    }

    /// The lightweight client: cookie-bearing, with the caller's timeout.
    pub fn http_client(&self, timeout: Duration) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .cookie_provider(self.cookie_jar())
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(client)
    }

    /// Open a page in `browser` carrying this session.
    ///
    /// The page is parked on the site root first; the browser only accepts
    /// cookies for the domain it is on.
    #[instrument(level = "debug", skip_all)]
    pub async fn seed_page(&self, browser: &BrowserHandle) -> Result<Page> {
        let page = browser.new_page(SITE_ROOT).await?;
        let params = self
            .replay_cookies()
            .iter()
            .map(SessionCookie::to_param)
            .collect::<Result<Vec<_>>>()?;
        page.set_cookies(params).await?;
        Ok(page)
    }
}

/// Log in once and harvest the resulting cookies.
///
/// The site finishes login with client-side redirects that set the cookies
/// asynchronously, so after submitting the form this waits `settle` before
/// reading them.
#[instrument(level = "info", skip_all, fields(user = %credentials.username))]
pub async fn authenticate(
    credentials: &Credentials,
    browser: BrowserSettings,
    settle: Duration,
) -> Result<Session> {
    let handle = BrowserHandle::launch(&browser).await?;
    let result = submit_login(&handle, credentials, settle).await;
    handle.close().await;

    let cookies = result?;
    if cookies.is_empty() {
        warn!("Login produced no cookies; paywalled pages will not render");
    }
    info!(cookies = cookies.len(), "Logged in");
    Ok(Session::new(cookies, browser))
}

async fn submit_login(
    browser: &BrowserHandle,
    credentials: &Credentials,
    settle: Duration,
) -> Result<Vec<SessionCookie>> {
    let page = browser.new_page(LOGIN_URL).await?;

    fill_field(&page, LOGIN_USER_FIELD, &credentials.username).await?;
    fill_field(&page, LOGIN_PASS_FIELD, &credentials.password).await?;
    page.find_element(LOGIN_SUBMIT)
        .await
        .map_err(|e| missing_form_element(LOGIN_SUBMIT, e))?
        .click()
        .await?;

    sleep(settle).await;

    let cookies = page.get_cookies().await?;
    Ok(cookies.into_iter().map(SessionCookie::from).collect())
}

async fn fill_field(page: &Page, selector: &str, text: &str) -> Result<()> {
    page.find_element(selector)
        .await
        .map_err(|e| missing_form_element(selector, e))?
        .click()
        .await?
        .type_str(text)
        .await?;
    Ok(())
}

fn missing_form_element(selector: &str, cause: impl fmt::Display) -> Error {
    Error::Authentication(format!("login form element `{}` not found: {}", selector, cause))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore;

    fn cookie(name: &str, expires: Option<f64>) -> SessionCookie {
        SessionCookie {
            name: name.to_string(),
            value: format!("{}-value", name),
            domain: ".bostonglobe.com".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: false,
            expires,
        }
    }

    #[test]
    fn test_credentials_require_both_values() {
        assert!(Credentials::new(Some("u".into()), Some("p".into())).is_ok());

        let missing_user = Credentials::new(None, Some("p".into()));
        assert!(matches!(missing_user, Err(Error::Authentication(_))));

        let blank_user = Credentials::new(Some("  ".into()), Some("p".into()));
        assert!(matches!(blank_user, Err(Error::Authentication(_))));

        let missing_pass = Credentials::new(Some("u".into()), None);
        assert!(matches!(missing_pass, Err(Error::Authentication(_))));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new(Some("reader".into()), Some("hunter2".into())).unwrap();
        let shown = format!("{:?}", creds);
        assert!(shown.contains("reader"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_replay_strips_expiry_only() {
        let session = Session::new(
            vec![cookie("a", Some(1_900_000_000.0)), cookie("b", None)],
            BrowserSettings::default(),
        );

        let replayed = session.replay_cookies();
        assert_eq!(replayed.len(), 2);
        assert!(replayed.iter().all(|c| c.expires.is_none()));
        assert_eq!(replayed[0].value, "a-value");
        // the session itself is untouched
        assert_eq!(session.cookies()[0].expires, Some(1_900_000_000.0));
    }

    #[test]
    fn test_cookie_jar_serves_secondary_host() {
        let session = Session::new(vec![cookie("token", None)], BrowserSettings::default());
        let jar = session.cookie_jar();

        let url = Url::parse("https://www3.bostonglobe.com/todayspaper/2024/01/02").unwrap();
        let header = jar.cookies(&url).expect("cookie header");
        assert_eq!(header.to_str().unwrap(), "token=token-value");
    }

    #[test]
    fn test_http_client_builds() {
        let session = Session::new(vec![cookie("token", None)], BrowserSettings::default());
        assert!(session.http_client(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_scope_url_defaults_path() {
        let mut c = cookie("a", None);
        c.path = String::new();
        assert_eq!(c.scope_url().unwrap().as_str(), "https://bostonglobe.com/");
    }
}
