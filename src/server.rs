//! HTTP surface: Atom feeds for listings and a reader view for articles.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /feeds/top-stories` | Atom feed of today's top stories |
//! | `GET /feeds/section/:section` | Atom feed of one section, 404 if absent today |
//! | `GET /proxy/*encoded` | HTML page of the article behind a proxy URL |
//! | `GET /health` | liveness and cache size |

use crate::error::Error;
use crate::feed::{build_feed, section_title, top_stories_title};
use crate::fetcher::PageSource;
use crate::render::render_article;
use crate::service::GlobeReader;
use crate::urls::{RequestOrigin, decode};
use axum::extract::{OriginalUri, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const ATOM_CONTENT_TYPE: &str = "application/atom+xml; charset=utf-8";

/// Error returned by handlers; upstream failures become 502, the rest 500.
#[derive(Debug)]
pub struct AppError(Error);

impl<E: Into<Error>> From<E> for AppError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.is_upstream() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        error!(status = status.as_u16(), error = %self.0, "Request failed");
        (status, self.0.to_string()).into_response()
    }
}

type HandlerResult = std::result::Result<Response, AppError>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    healthy: bool,
    version: String,
    cached_articles: u64,
}

fn atom(body: String) -> Response {
    ([(header::CONTENT_TYPE, ATOM_CONTENT_TYPE)], body).into_response()
}

async fn top_stories<S: PageSource + 'static>(
    State(reader): State<Arc<GlobeReader<S>>>,
    headers: HeaderMap,
) -> HandlerResult {
    let origin = RequestOrigin::from_headers(&headers);
    let stories = reader.top_stories(&origin).await?;
    let feed = build_feed(&reader, &origin, &top_stories_title(), stories).await?;
    Ok(atom(feed))
}

async fn section<S: PageSource + 'static>(
    State(reader): State<Arc<GlobeReader<S>>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> HandlerResult {
    let origin = RequestOrigin::from_headers(&headers);
    let Some(stories) = reader.section(&origin, &name).await? else {
        warn!(section = %name, "Requested section not in today's paper");
        return Ok((StatusCode::NOT_FOUND, format!("no section named {}", name)).into_response());
    };
    let feed = build_feed(&reader, &origin, &section_title(&name), stories).await?;
    Ok(atom(feed))
}

async fn proxy<S: PageSource + 'static>(
    State(reader): State<Arc<GlobeReader<S>>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> HandlerResult {
    let origin = RequestOrigin::from_headers(&headers);
    let proxied = format!("{}{}", origin, uri.path());
    let article = reader.get_article(&origin, &proxied).await?;
    let page = render_article(&article, &decode(&origin, &proxied))?;
    Ok(Html(page).into_response())
}

async fn health<S: PageSource + 'static>(
    State(reader): State<Arc<GlobeReader<S>>>,
) -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        cached_articles: reader.cache().entry_count(),
    })
}

/// Build the router over a shared reader.
pub fn create_router<S: PageSource + 'static>(reader: Arc<GlobeReader<S>>) -> Router {
    Router::new()
        .route("/feeds/top-stories", get(top_stories::<S>))
        .route("/feeds/section/:section", get(section::<S>))
        .route("/proxy/*encoded", get(proxy::<S>))
        .route("/health", get(health::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(reader)
}

/// Serve until Ctrl-C.
pub async fn serve<S: PageSource + 'static>(
    addr: SocketAddr,
    reader: Arc<GlobeReader<S>>,
) -> crate::error::Result<()> {
    let app = create_router(reader);
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Could not install Ctrl-C handler");
            }
            info!("HTTP server shutting down");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ArticleCache;
    use crate::fetcher::fake::FakeSite;
    use crate::listing::today_url;
    use crate::urls::encode;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use chrono::Local;
    use tower::ServiceExt;

    const ARTICLE_URL: &str = "https://www3.bostonglobe.com/metro/story";

    const ARTICLE_PAGE: &str = r#"<html><head><title>Story &amp; more - The Boston Globe</title>
        <script type="application/ld+json">{"author":"Jane Doe","description":"Short"}</script>
        </head><body>
        <script>Fusion.globalContent={"_id":"1","content_elements":[{"type":"text","content":"Body text."}]};Fusion.globalContentConfig={};</script>
        </body></html>"#;

    fn front_page() -> String {
        r#"<div class="stories-top"><div class="story"><h2>Story</h2><a href="/metro/story">x</a></div></div>
        <div class="tod-paper-section"><h2><a href="/metro">Metro</a></h2>
          <a href="/metro">Metro</a><h3>Metro</h3>
          <h3><a href="/metro/story">Story</a></h3>
        </div>"#
            .to_string()
    }

    fn app(site: FakeSite) -> Router {
        create_router(Arc::new(GlobeReader::new(site, ArticleCache::default())))
    }

    fn get_request(path: &str) -> Request<Body> {
        Request::builder()
            .uri(path)
            .header(header::HOST, "feeds.example")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn today() -> String {
        today_url(Local::now().date_naive())
    }

    #[tokio::test]
    async fn test_top_stories_feed() {
        let site = FakeSite::new()
            .page(&today(), 200, &front_page())
            .page(ARTICLE_URL, 200, ARTICLE_PAGE);
        let response = app(site).oneshot(get_request("/feeds/top-stories")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], ATOM_CONTENT_TYPE);
        let body = body_text(response).await;
        assert!(body.contains("<title>Boston Globe - Top Stories</title>"));
        assert!(body.contains("http://feeds.example/proxy/https%3A%2F%2Fwww3.bostonglobe.com%2Fmetro%2Fstory"));
        assert!(body.contains("<name>Jane Doe</name>"));
    }

    #[tokio::test]
    async fn test_section_feed_and_missing_section() {
        let site = FakeSite::new()
            .page(&today(), 200, &front_page())
            .page(ARTICLE_URL, 200, ARTICLE_PAGE);
        let app = app(site);

        let found = app.clone().oneshot(get_request("/feeds/section/metro")).await.unwrap();
        assert_eq!(found.status(), StatusCode::OK);
        assert!(body_text(found).await.contains("<title>Boston Globe - Metro</title>"));

        let missing = app.oneshot(get_request("/feeds/section/sports")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_proxy_renders_article() {
        let site = FakeSite::new().page(ARTICLE_URL, 200, ARTICLE_PAGE);
        let origin = RequestOrigin::new("http://feeds.example");
        let proxied = encode(&origin, ARTICLE_URL);
        let path = proxied.trim_start_matches(origin.as_str());

        let response = app(site).oneshot(get_request(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("<h1>Story &amp; more</h1>"));
        assert!(body.contains("<p>Body text.</p>"));
        assert!(body.contains(r#"href="https://www3.bostonglobe.com/metro/story""#));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let site = FakeSite::new().page(&today(), 503, "busy");
        let response = app(site).oneshot(get_request("/feeds/top-stories")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(FakeSite::new()).oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains(r#""healthy":true"#));
    }

    #[test]
    fn test_error_status_mapping() {
        let upstream = AppError::from(Error::Status {
            status: 500,
            url: "u".to_string(),
        });
        assert_eq!(upstream.into_response().status(), StatusCode::BAD_GATEWAY);

        let local = AppError::from(Error::Launch("no chrome".to_string()));
        assert_eq!(local.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
