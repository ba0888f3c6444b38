use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};

use crate::dashboard::handlers::not_found;
use crate::state::AppState;
use crate::{accounts, dashboard};

pub fn build_app<Store>(state: AppState, sessions: Store) -> Router
where
    Store: SessionStore + Clone,
{
    let session_layer = SessionManagerLayer::new(sessions)
        .with_secure(state.config.secure_cookies)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            state.config.session_idle_minutes,
        )));

    Router::new()
        .merge(accounts::router(state.config.upload_max_bytes))
        .merge(dashboard::router())
        .route("/health", get(|| async { "ok" }))
        .fallback(not_found)
        .with_state(state)
        .layer(session_layer)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{
            header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
            Request, Response, StatusCode,
        },
    };
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::testing::{MemoryUserStore, RecordingStorage};

    const BOUNDARY: &str = "helpdesk-test-boundary";

    /// Minimal cookie-carrying client around the router.
    struct Browser {
        app: Router,
        cookies: HashMap<String, String>,
        users: Arc<MemoryUserStore>,
        storage: Arc<RecordingStorage>,
    }

    /// File part of an account form: file name, content type and bytes.
    type FilePart<'a> = (&'a str, &'a str, &'a [u8]);

    impl Browser {
        fn new() -> Self {
            let users = Arc::new(MemoryUserStore::default());
            let storage = Arc::new(RecordingStorage::default());
            let state = AppState::fake(users.clone(), storage.clone());
            Self {
                app: build_app(state, MemoryStore::default()),
                cookies: HashMap::new(),
                users,
                storage,
            }
        }

        async fn send(&mut self, req: axum::http::request::Builder, body: Body) -> Response<Body> {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            let req = if cookie.is_empty() { req } else { req.header(COOKIE, cookie) };
            let res = self
                .app
                .clone()
                .oneshot(req.body(body).unwrap())
                .await
                .unwrap();
            for set in res.headers().get_all(SET_COOKIE) {
                let set = set.to_str().unwrap();
                let pair = set.split(';').next().unwrap();
                let (name, value) = pair.split_once('=').unwrap();
                if value.is_empty() || set.contains("Max-Age=0") {
                    self.cookies.remove(name);
                } else {
                    self.cookies.insert(name.to_string(), value.to_string());
                }
            }
            res
        }

        async fn submit(
            &mut self,
            uri: &str,
            fields: &[(&str, &str)],
            image: Option<FilePart<'_>>,
        ) -> Response<Body> {
            let mut body = Vec::new();
            for (name, value) in fields {
                body.extend_from_slice(
                    format!(
                        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                    )
                    .as_bytes(),
                );
            }
            if let Some((filename, content_type, bytes)) = image {
                body.extend_from_slice(
                    format!(
                        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
            body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
            self.send(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}")),
                Body::from(body),
            )
            .await
        }

        async fn register(&mut self, fields: &[(&str, &str)]) -> Response<Body> {
            self.submit("/api-users/register", fields, None).await
        }

        async fn login(&mut self, username: &str, password: &str) -> Response<Body> {
            self.send(
                Request::builder()
                    .method("POST")
                    .uri("/api-users/login")
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded"),
                Body::from(format!("username={username}&password={password}")),
            )
            .await
        }

        async fn get(&mut self, uri: &str) -> Response<Body> {
            self.send(Request::builder().uri(uri), Body::empty()).await
        }

        async fn post(&mut self, uri: &str) -> Response<Body> {
            self.send(Request::builder().method("POST").uri(uri), Body::empty())
                .await
        }
    }

    fn location(res: &Response<Body>) -> &str {
        res.headers().get(LOCATION).unwrap().to_str().unwrap()
    }

    async fn json(res: Response<Body>) -> serde_json::Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn register_login_logout_over_http() {
        let mut browser = Browser::new();

        let res = browser
            .register(&[("username", "alice"), ("email", "alice@x.com"), ("password", "pw123")])
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/login");

        let page = json(browser.get("/login").await).await;
        assert_eq!(page["message"], "Welcome alice");
        // One-shot: gone on the next render.
        let page = json(browser.get("/login").await).await;
        assert!(page["message"].is_null());

        let res = browser.login("alice", "pw123").await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/dashboard/user");
        assert!(browser.cookies.contains_key("token"));

        let res = browser.get("/dashboard/user").await;
        assert_eq!(res.status(), StatusCode::OK);
        let profile = json(res).await;
        assert_eq!(profile["username"], "alice");
        assert_eq!(profile["role"], "user");

        let res = browser.post("/api-users/logout").await;
        assert_eq!(location(&res), "/login");
        assert!(!browser.cookies.contains_key("token"));

        let res = browser.get("/dashboard/user").await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/login");
    }

    #[tokio::test]
    async fn failed_logins_set_no_token() {
        let mut browser = Browser::new();
        browser
            .register(&[("username", "alice"), ("email", "alice@x.com"), ("password", "pw123")])
            .await;

        let res = browser.login("nobody", "pw123").await;
        assert_eq!(location(&res), "/login");
        assert!(!browser.cookies.contains_key("token"));
        let page = json(browser.get("/login").await).await;
        assert_eq!(page["message"], "User does not exist");

        let res = browser.login("alice", "wrong").await;
        assert_eq!(location(&res), "/login");
        assert!(!browser.cookies.contains_key("token"));
        let page = json(browser.get("/login").await).await;
        assert_eq!(page["message"], "Incorrect username or password");
    }

    #[tokio::test]
    async fn admin_pages_refuse_regular_users() {
        let mut browser = Browser::new();
        browser
            .register(&[("username", "alice"), ("email", "alice@x.com"), ("password", "pw")])
            .await;
        browser.login("alice", "pw").await;

        let res = browser.get("/dashboard/dash-users").await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/dashboard/user");

        let id = browser.users.by_username("alice").unwrap().id;
        let res = browser.post(&format!("/api-users/delete/{id}")).await;
        assert_eq!(location(&res), "/dashboard/user");
        assert_eq!(browser.users.len(), 1);
    }

    #[tokio::test]
    async fn admin_lists_and_deletes_users() {
        let mut browser = Browser::new();
        browser
            .register(&[("username", "root"), ("email", "root@x.com"), ("password", "pw")])
            .await;
        browser
            .register(&[("username", "bob"), ("email", "bob@x.com"), ("password", "pw")])
            .await;
        let mut root = browser.users.by_username("root").unwrap();
        root.is_admin = true;
        browser.users.put(root);

        let res = browser.login("root", "pw").await;
        assert_eq!(location(&res), "/dashboard/dash-admin");

        let list = json(browser.get("/dashboard/dash-users").await).await;
        assert_eq!(list["users"].as_array().unwrap().len(), 2);
        assert!(list.to_string().find("password").is_none());

        let bob = browser.users.by_username("bob").unwrap().id;
        let res = browser.post(&format!("/api-users/delete/{bob}")).await;
        assert_eq!(location(&res), "/dashboard/dash-users");
        assert!(browser.users.by_username("bob").is_none());

        let list = json(browser.get("/dashboard/dash-users").await).await;
        assert_eq!(list["message"], "User deleted successfully");
        assert_eq!(list["users"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn edit_mode_round_trip() {
        let mut browser = Browser::new();
        browser
            .register(&[("username", "alice"), ("email", "alice@x.com"), ("password", "pw")])
            .await;
        browser.login("alice", "pw").await;

        let res = browser.post("/api-users/edit").await;
        assert_eq!(location(&res), "/dashboard/user");
        let profile = json(browser.get("/dashboard/user").await).await;
        assert_eq!(profile["editing"], true);

        let res = browser.get("/api-users/back").await;
        assert_eq!(location(&res), "/dashboard/dash-users");
        let profile = json(browser.get("/dashboard/user").await).await;
        assert_eq!(profile["editing"], false);
    }

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

    #[tokio::test]
    async fn register_with_image_stores_the_upload() {
        let mut browser = Browser::new();
        let res = browser
            .submit(
                "/api-users/register",
                &[("username", "alice"), ("email", "alice@x.com"), ("password", "pw")],
                Some(("me.png", "image/png", PNG)),
            )
            .await;
        assert_eq!(location(&res), "/login");

        let row = browser.users.by_username("alice").unwrap();
        assert!(row.image_url.starts_with("/uploads/"));
        assert!(row.image_url.ends_with(".png"));
        assert_eq!(browser.storage.puts(), vec![row.image_url[1..].to_string()]);
    }

    #[tokio::test]
    async fn oversized_upload_is_refused() {
        let mut browser = Browser::new();
        let big = vec![0u8; 2 * 1024 * 1024];
        let res = browser
            .submit(
                "/api-users/register",
                &[("username", "alice"), ("email", "alice@x.com"), ("password", "pw")],
                Some(("big.png", "image/png", big.as_slice())),
            )
            .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(browser.users.len(), 0);
        assert!(browser.storage.puts().is_empty());
    }

    #[tokio::test]
    async fn update_over_http_keeps_blanks_and_swaps_image() {
        let mut browser = Browser::new();
        browser
            .register(&[("username", "alice"), ("email", "alice@x.com"), ("password", "pw123")])
            .await;
        browser.login("alice", "pw123").await;
        let id = browser.users.by_username("alice").unwrap().id;

        let res = browser
            .submit(
                &format!("/api-users/update/{id}"),
                &[("username", ""), ("email", ""), ("password", "newpw")],
                Some(("me.png", "image/png", PNG)),
            )
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/dashboard/user");

        let row = browser.users.get(id).unwrap();
        assert_eq!(row.username, "alice");
        assert_eq!(row.email, "alice@x.com");
        assert!(row.image_url.starts_with("/uploads/"));
        assert!(row.image_url.ends_with(".png"));
        // The placeholder was the previous image; nothing local to delete.
        assert!(browser.storage.deletes().is_empty());

        let profile = json(browser.get("/dashboard/user").await).await;
        assert_eq!(profile["image_url"], row.image_url.as_str());
        assert_eq!(profile["message"], "Data updated successfully");

        browser.post("/api-users/logout").await;
        let res = browser.login("alice", "pw123").await;
        assert_eq!(location(&res), "/login");
        let res = browser.login("alice", "newpw").await;
        assert_eq!(location(&res), "/dashboard/user");
    }

    #[tokio::test]
    async fn empty_file_part_is_no_upload() {
        let mut browser = Browser::new();
        browser
            .register(&[("username", "alice"), ("email", "alice@x.com"), ("password", "pw")])
            .await;
        browser.login("alice", "pw").await;
        let before = browser.users.by_username("alice").unwrap();

        let res = browser
            .submit(
                &format!("/api-users/update/{}", before.id),
                &[("username", ""), ("email", ""), ("password", "")],
                Some(("", "application/octet-stream", b"".as_slice())),
            )
            .await;
        assert_eq!(location(&res), "/dashboard/user");

        let after = browser.users.get(before.id).unwrap();
        assert_eq!(after.image_url, before.image_url);
        assert_eq!(after.password_hash, before.password_hash);
        assert!(browser.storage.puts().is_empty());
        assert!(browser.storage.deletes().is_empty());
    }

    #[tokio::test]
    async fn update_needs_a_token() {
        let mut browser = Browser::new();
        browser
            .register(&[("username", "alice"), ("email", "alice@x.com"), ("password", "pw")])
            .await;
        let id = browser.users.by_username("alice").unwrap().id;

        let res = browser
            .submit(
                &format!("/api-users/update/{id}"),
                &[("username", "mallory"), ("email", ""), ("password", "")],
                None,
            )
            .await;
        assert_eq!(location(&res), "/login");
        assert_eq!(browser.users.get(id).unwrap().username, "alice");
    }

    #[tokio::test]
    async fn faqs_page_leaves_edit_mode() {
        let mut browser = Browser::new();
        browser
            .register(&[("username", "alice"), ("email", "alice@x.com"), ("password", "pw")])
            .await;
        browser.login("alice", "pw").await;
        browser.post("/api-users/edit").await;

        let page = json(browser.get("/faqs").await).await;
        assert_eq!(page["signed_in"], true);
        let profile = json(browser.get("/dashboard/user").await).await;
        assert_eq!(profile["editing"], false);
    }

    #[tokio::test]
    async fn store_outage_is_a_plain_500() {
        let mut browser = Browser::new();
        browser.users.break_connection();

        let res = browser
            .register(&[("username", "alice"), ("email", "alice@x.com"), ("password", "pw")])
            .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Error during user registration");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let mut browser = Browser::new();
        let res = browser.get("/nope").await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(browser.get("/health").await.status(), StatusCode::OK);
    }
}
