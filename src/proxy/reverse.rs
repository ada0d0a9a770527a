//! Single-host reverse proxy
//!
//! Relays one request to a fixed upstream base URL and turns the
//! upstream's reply back into a [`Response`].

use futures_util::StreamExt;
use reqwest::redirect::Policy;
use reqwest::Client;
use url::Url;

use crate::error::ProxyError;
use crate::http::headers::{remove_hop_by_hop, HeaderMap};
use crate::http::request::{Method, Request};
use crate::http::response::{Body, Response, StatusCode};

/// Forwarding handle bound to one upstream base URL.
#[derive(Debug)]
pub struct ReverseProxy {
    target: Url,
    client: Client,
    preserve_host: bool,
}

impl ReverseProxy {
    /// Create a proxy for `target`.
    ///
    /// The client never follows redirects and ignores proxy settings from
    /// the environment; upstream 3xx responses reach the caller as-is.
    pub fn new(target: Url) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .redirect(Policy::none())
            .no_proxy()
            .build()?;

        Ok(Self {
            target,
            client,
            preserve_host: false,
        })
    }

    /// Pass the client's `Host` header through instead of the upstream's.
    pub fn with_preserve_host(mut self, preserve_host: bool) -> Self {
        self.preserve_host = preserve_host;
        self
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Map an inbound request target onto the upstream.
    ///
    /// The upstream path is joined to the request path with a single slash,
    /// and the two query strings are joined with `&` when both are present.
    pub fn rewrite_url(&self, request_target: &str) -> Result<Url, ProxyError> {
        let (path, query) = if request_target.starts_with('/') {
            match request_target.split_once('?') {
                Some((path, query)) => (path.to_string(), query.to_string()),
                None => (request_target.to_string(), String::new()),
            }
        } else {
            // absolute-form, e.g. "http://host/path?x=1"
            let parsed = Url::parse(request_target)
                .map_err(|_| ProxyError::InvalidTarget(request_target.to_string()))?;
            (
                parsed.path().to_string(),
                parsed.query().unwrap_or_default().to_string(),
            )
        };

        let mut url = self.target.clone();
        url.set_path(&join_paths(self.target.path(), &path));
        url.set_fragment(None);

        let base_query = self.target.query().unwrap_or_default();
        let query = if base_query.is_empty() || query.is_empty() {
            format!("{base_query}{query}")
        } else {
            format!("{base_query}&{query}")
        };
        url.set_query((!query.is_empty()).then_some(query.as_str()));

        Ok(url)
    }

    /// Headers sent upstream for `request`.
    ///
    /// Hop-by-hop headers are dropped and `Content-Length` is left to the
    /// client. `Host` is replaced by the upstream's own unless the proxy
    /// preserves it. `Expect` was already answered on the inbound side. The
    /// caller's IP is appended to `X-Forwarded-For`.
    pub fn outbound_headers(&self, request: &Request) -> HeaderMap {
        let mut headers = request.headers.clone();
        remove_hop_by_hop(&mut headers);
        if !self.preserve_host {
            headers.remove("Host");
        }
        headers.remove("Content-Length");
        headers.remove("Expect");

        if let Some(addr) = request.remote_addr {
            let client_ip = addr.ip().to_string();
            let prior: Vec<&str> = request.headers.get_all("X-Forwarded-For").collect();
            let forwarded = if prior.is_empty() {
                client_ip
            } else {
                format!("{}, {}", prior.join(", "), client_ip)
            };
            headers.insert("X-Forwarded-For", forwarded);
        }

        headers
    }

    /// Relay `request` to the upstream.
    ///
    /// Returns once the upstream's head has arrived; the body is handed on
    /// as a stream. Transport failures before that come back as
    /// [`ProxyError::Upstream`]; any status the upstream returns, error
    /// statuses included, is a successful relay.
    pub async fn serve(&self, request: Request) -> Result<Response, ProxyError> {
        let url = self.rewrite_url(&request.path)?;
        let headers = self.outbound_headers(&request);
        let is_head = request.method == Method::HEAD;

        let mut builder = self.client.request(to_reqwest_method(&request.method), url);
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let upstream = builder.send().await?;

        let code = upstream.status().as_u16();
        let status = StatusCode::from_u16(code).ok_or(ProxyError::InvalidStatus(code))?;

        let mut headers: HeaderMap = upstream
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        remove_hop_by_hop(&mut headers);

        // HEAD, 204 and 304 replies carry no body but keep their headers.
        let body = if is_head || code == 204 || code == 304 {
            Body::empty()
        } else {
            let length = upstream.content_length();
            match length {
                Some(len) => headers.insert("Content-Length", len.to_string()),
                None => headers.remove("Content-Length"),
            }
            Body::Stream {
                stream: upstream
                    .bytes_stream()
                    .map(|chunk| chunk.map_err(std::io::Error::other))
                    .boxed(),
                length,
            }
        };

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

fn to_reqwest_method(method: &Method) -> reqwest::Method {
    match method {
        Method::GET => reqwest::Method::GET,
        Method::POST => reqwest::Method::POST,
        Method::PUT => reqwest::Method::PUT,
        Method::DELETE => reqwest::Method::DELETE,
        Method::HEAD => reqwest::Method::HEAD,
        Method::OPTIONS => reqwest::Method::OPTIONS,
        Method::PATCH => reqwest::Method::PATCH,
        Method::CONNECT => reqwest::Method::CONNECT,
        Method::TRACE => reqwest::Method::TRACE,
    }
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_paths_uses_exactly_one_slash() {
        assert_eq!(join_paths("/", "/search"), "/search");
        assert_eq!(join_paths("/api", "/v1"), "/api/v1");
        assert_eq!(join_paths("/api/", "v1"), "/api/v1");
        assert_eq!(join_paths("/api", "v1"), "/api/v1");
    }
}
