use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes a prepared HTTP request. Decorators such as [`ApiKey`] wrap an
/// inner client and adjust the request before delegating.
///
/// [`ApiKey`]: super::auth::ApiKey
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
