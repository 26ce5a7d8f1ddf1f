//! Shared HTTP client setup for the remote sources.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Response};

use crate::config::ApiConfig;
use crate::error::{Error, Result};

/// Build the client used for both the catalog and the flight feed.
///
/// Every request carries the configured `User-Agent`, asks for JSON, and is
/// bounded by `api.request_timeout_secs`.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_client(api: &ApiConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Client::builder()
        .user_agent(api.user_agent.clone())
        .default_headers(headers)
        .timeout(api.request_timeout())
        .build()
        .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))
}

/// Turn a non-success status into an error, passing other responses through.
///
/// # Errors
///
/// Returns [`Error::HttpStatus`] for any 4xx/5xx response.
pub fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

/// A local HTTP server that records requests and answers with a canned reply.
#[cfg(test)]
pub(crate) mod stub {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Query, State},
        http::{HeaderMap, StatusCode},
        routing::get,
        Router,
    };
    use tokio::net::TcpListener;

    /// One request as the stub saw it.
    #[derive(Debug, Clone)]
    pub struct Seen {
        pub query: HashMap<String, String>,
        pub headers: HeaderMap,
    }

    #[derive(Clone)]
    struct Reply {
        status: StatusCode,
        body: String,
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    #[derive(Debug)]
    pub struct StubServer {
        /// Full URL of the stubbed route.
        pub url: String,
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    impl StubServer {
        /// Serve `body` with `status` on `path` from an ephemeral port.
        pub async fn start(path: &str, status: u16, body: &str) -> Self {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let reply = Reply {
                status: StatusCode::from_u16(status).unwrap(),
                body: body.to_string(),
                seen: Arc::clone(&seen),
            };
            let app = Router::new().route(path, get(respond)).with_state(reply);
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}{path}", listener.local_addr().unwrap());
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
            Self { url, seen }
        }

        pub fn requests(&self) -> Vec<Seen> {
            self.seen.lock().unwrap().clone()
        }
    }

    async fn respond(
        State(reply): State<Reply>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> (StatusCode, String) {
        reply.seen.lock().unwrap().push(Seen { query, headers });
        (reply.status, reply.body.clone())
    }
}
