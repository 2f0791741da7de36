use crate::error::TransportError;
use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};

/// An [`HttpClient`] wrapper that injects an API key as an HTTP header.
///
/// The header name and value are validated once at construction, so every
/// request carries exactly the same, known-good header. The value is marked
/// sensitive to keep it out of reqwest's debug output.
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    key: HeaderValue,
}

impl<C> ApiKey<C> {
    /// Sends `key` verbatim as the `Authorization` header. TfNSW expects the
    /// full `apikey <token>` string here, so no scheme is prepended.
    pub fn authorization(inner: C, key: &str) -> Result<Self, TransportError> {
        Self::header(inner, AUTHORIZATION, key)
    }

    pub fn header(inner: C, header_name: HeaderName, key: &str) -> Result<Self, TransportError> {
        let mut key = HeaderValue::from_str(key).map_err(|_| TransportError::InvalidHeader {
            header: header_name.to_string(),
        })?;
        key.set_sensitive(true);
        Ok(Self {
            inner,
            header_name,
            key,
        })
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C> std::fmt::Debug for ApiKey<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("header_name", &self.header_name)
            .field("key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.key.clone());
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<reqwest::header::HeaderMap>>,
    }

    #[async_trait]
    impl HttpClient for Recorder {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            self.seen.lock().unwrap().push(req.headers().clone());
            Ok(http::Response::new(Vec::<u8>::new()).into())
        }
    }

    #[tokio::test]
    async fn test_authorization_header_sent_verbatim() {
        let client = ApiKey::authorization(Recorder::default(), "apikey abc123").unwrap();
        let req = reqwest::Request::new(
            reqwest::Method::GET,
            "http://example.test/feed".parse().unwrap(),
        );
        client.execute(req).await.unwrap();

        let seen = client.inner().seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0][AUTHORIZATION], "apikey abc123");
    }

    #[test]
    fn test_invalid_header_value_rejected() {
        let err = ApiKey::authorization(Recorder::default(), "bad\nkey").unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader { .. }));
    }

    #[test]
    fn test_debug_hides_key() {
        let client = ApiKey::authorization(Recorder::default(), "apikey abc123").unwrap();
        assert!(!format!("{client:?}").contains("abc123"));
    }
}
