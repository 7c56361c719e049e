//! HTTP request handling.
//!
//! Drives the trust machinery for one request of a connection and answers with
//! the address the request was attributed to.
//!
//! # Flow
//!
//! 1. Select the resolver scope from the `Host` header
//! 2. Resolve and bind the client address on the connection context
//! 3. Answer `200` with the client IP, or `403` when the request was denied

use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, Response, StatusCode};

use crate::binder::{ConnectionContext, ProxyChainNote, ResolvedClient, bind_request};
use crate::headers;
use crate::types::ScopeProvider;

/// Handles one request of a connection.
///
/// `conn` is the context of the connection the request arrived on; it is only
/// locked for the synchronous resolve step.
///
/// # Returns
///
/// Always returns `Ok` with either:
/// - `200 text/plain` carrying the client IP, plus `x-real-ip` and, when
///   external proxies were crossed, `x-proxy-ip-list`
/// - an error response (403 on denial)
pub async fn handle_request<B, S: ScopeProvider>(
    mut req: Request<B>,
    conn: Arc<Mutex<ConnectionContext>>,
    scopes: Arc<S>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let host = request_host(&req);
    let config = scopes.scope_for(host.as_deref());

    let bound = {
        let mut conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
        bind_request(&mut req, &mut conn, config)
    };

    match bound {
        Ok(client) => {
            let note = req.extensions().get::<ProxyChainNote>();
            Ok(create_client_response(&client, note))
        }
        Err(err) => Ok(create_error_response(err.status_code(), err.user_message())),
    }
}

/// Host the request is addressed to, from the `Host` header or an absolute URI.
fn request_host<B>(req: &Request<B>) -> Option<String> {
    req.headers()
        .get(headers::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().host().map(str::to_string))
}

fn create_client_response(
    client: &ResolvedClient,
    note: Option<&ProxyChainNote>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(headers::CONTENT_TYPE, "text/plain")
        .header(headers::X_REAL_IP, client.ip.as_str());

    if let Some(ProxyChainNote(proxies)) = note {
        builder = builder.header(headers::X_PROXY_IP_LIST, proxies.as_str());
    }

    builder
        .body(Full::new(Bytes::from(format!("{}\n", client.ip))))
        .unwrap_or_else(|_| {
            create_error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        })
}

/// Creates a plain text error response.
pub fn create_error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(headers::CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from(message.to_string())))
        .unwrap_or_else(|_| {
            // Fallback response if builder fails (extremely unlikely)
            Response::new(Full::new(Bytes::from("Internal Server Error")))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{StaticResolver, TestConfig};
    use crate::types::{ResolverScopes, ResolverSettings};
    use http_body_util::BodyExt;
    use std::net::SocketAddr;

    fn connection(peer: &str) -> Arc<Mutex<ConnectionContext>> {
        let addr: SocketAddr = format!("{peer}:40000").parse().unwrap();
        Arc::new(Mutex::new(ConnectionContext::new(addr)))
    }

    fn scopes() -> Arc<ResolverScopes> {
        let mut scopes = ResolverScopes::new(TestConfig::new().build());
        let settings = ResolverSettings {
            deny_untrusted: Some(true),
            ..ResolverSettings::default()
        };
        scopes
            .add_virtual_host("strict.example.com", &settings, &StaticResolver::default())
            .unwrap();
        Arc::new(scopes)
    }

    fn request(host: &str, client_ip: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().uri("/").header("host", host);
        if let Some(ip) = client_ip {
            builder = builder.header("incap-client-ip", ip);
        }
        builder.body(()).unwrap()
    }

    async fn body_of(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    // ===========================================
    // handle_request tests
    // ===========================================

    #[tokio::test]
    async fn test_echoes_resolved_client() {
        let response = handle_request(
            request("www.example.com", Some("198.51.100.7")),
            connection("199.83.128.10"),
            scopes(),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-real-ip").unwrap(), "198.51.100.7");
        assert_eq!(
            response.headers().get("x-proxy-ip-list").unwrap(),
            "199.83.128.10"
        );
        assert_eq!(body_of(response).await, "198.51.100.7\n");
    }

    #[tokio::test]
    async fn test_no_proxy_list_header_for_direct_client() {
        let response = handle_request(
            request("www.example.com", None),
            connection("203.0.113.50"),
            scopes(),
        )
        .await
        .unwrap();

        assert_eq!(response.headers().get("x-real-ip").unwrap(), "203.0.113.50");
        assert!(response.headers().get("x-proxy-ip-list").is_none());
    }

    #[tokio::test]
    async fn test_virtual_host_deny_returns_forbidden() {
        let response = handle_request(
            request("STRICT.example.com:8080", Some("198.51.100.7")),
            connection("203.0.113.50"),
            scopes(),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_of(response).await, "Forbidden");
    }

    #[tokio::test]
    async fn test_keep_alive_requests_share_connection_state() {
        let conn = connection("199.83.128.10");
        let scopes = scopes();

        let first = handle_request(request("a.example.com", Some("1.2.3.4")), conn.clone(), scopes.clone())
            .await
            .unwrap();
        assert_eq!(body_of(first).await, "1.2.3.4\n");

        let second = handle_request(request("a.example.com", None), conn.clone(), scopes)
            .await
            .unwrap();
        assert_eq!(body_of(second).await, "199.83.128.10\n");

        let conn = conn.lock().unwrap();
        assert_eq!(conn.client_addr().to_string(), "199.83.128.10");
    }

    #[test]
    fn test_request_host_from_absolute_uri() {
        let req = Request::builder()
            .uri("http://api.example.com/path")
            .body(())
            .unwrap();
        assert_eq!(request_host(&req).as_deref(), Some("api.example.com"));
    }

    // ===========================================
    // create_error_response tests
    // ===========================================

    #[test]
    fn test_create_error_response_status() {
        let response = create_error_response(StatusCode::FORBIDDEN, "Forbidden");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = create_error_response(StatusCode::INTERNAL_SERVER_ERROR, "Oops");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_create_error_response_content_type() {
        let response = create_error_response(StatusCode::FORBIDDEN, "Forbidden");
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/plain"
        );
    }

    #[tokio::test]
    async fn test_create_error_response_body() {
        let response = create_error_response(StatusCode::FORBIDDEN, "Forbidden");
        assert_eq!(body_of(response).await, "Forbidden");
    }
}
