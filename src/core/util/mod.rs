use std::{fmt::Debug, time::Duration};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use http::{header, Request, Response, StatusCode};
use url::Url;

/// Generic HTTP client.
///
/// A trait is used here so that status lists and trust statements can be
/// fetched through whatever client (and TLS stack) the embedding service uses.
#[async_trait]
pub trait AsyncHttpClient: Debug + Send + Sync {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>;
}

/// Performs a GET and returns the body as text, failing on any non-200 status.
pub async fn get_text<C: AsyncHttpClient + ?Sized>(
    client: &C,
    url: &Url,
    accept: &str,
) -> Result<String> {
    let request = Request::builder()
        .method("GET")
        .uri(url.as_str())
        .header(header::ACCEPT, accept)
        .body(Vec::new())
        .context("unable to build request")?;

    let response = client.execute(request).await?;
    if response.status() != StatusCode::OK {
        bail!("GET {url} returned status {}", response.status())
    }
    String::from_utf8(response.into_body()).context("response body was not utf-8")
}

#[derive(Debug)]
pub struct ReqwestClient(reqwest::Client);

impl AsRef<reqwest::Client> for ReqwestClient {
    fn as_ref(&self) -> &reqwest::Client {
        &self.0
    }
}

impl ReqwestClient {
    /// Every request made through this client is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .context("unable to build http_client")
            .map(Self)
    }
}

#[async_trait]
impl AsyncHttpClient for ReqwestClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let response = self
            .0
            .execute(request.try_into().context("unable to convert request")?)
            .await
            .context("http request failed")?;

        let mut builder = Response::builder()
            .status(response.status())
            .version(response.version());

        builder
            .headers_mut()
            .context("unable to set headers")?
            .extend(response.headers().clone());

        builder
            .body(
                response
                    .bytes()
                    .await
                    .context("failed to extract response body")?
                    .to_vec(),
            )
            .context("unable to construct response")
    }
}
