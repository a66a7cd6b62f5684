use anyhow::{Context, Result, bail};
use reqwest::{Client, Response};
use std::time::Duration;

/// Largest attachment the adapter will download (20 MiB).
pub const MAX_ATTACHMENT_BYTES: usize = 20 * 1024 * 1024;

/// How much of an error response body is read for diagnostics.
pub const MAX_ERROR_BODY_BYTES: usize = 4 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn user_agent() -> String {
    format!("rocketlink/{}", crate::VERSION)
}

/// Client with the adapter's user agent, a 10 s connect timeout and the given
/// overall request timeout.
pub fn http_client(request_timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent())
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()
        .context("failed to build HTTP client")
}

/// [`http_client`] with a 30 s request timeout, falling back to a bare
/// client if the builder fails.
pub fn default_http_client() -> Client {
    http_client(DEFAULT_REQUEST_TIMEOUT).unwrap_or_else(|_| Client::new())
}

/// A response body read up to a byte limit.
#[derive(Debug, Default)]
pub struct BoundedBody {
    pub bytes: Vec<u8>,
    /// The server sent more than the limit; `bytes` holds only the prefix.
    pub truncated: bool,
}

/// Read at most `max_bytes` of the body.
///
/// A declared `Content-Length` above the limit is rejected before any bytes
/// are read. Otherwise the body is streamed and cut at the limit.
pub async fn limited_body(mut resp: Response, max_bytes: usize) -> Result<BoundedBody> {
    if let Some(declared) = resp.content_length()
        && declared as usize > max_bytes
    {
        bail!("response body too large: Content-Length {declared} exceeds limit {max_bytes}");
    }

    let mut body = BoundedBody::default();
    while let Some(chunk) = resp.chunk().await? {
        let room = max_bytes - body.bytes.len();
        if chunk.len() > room {
            body.bytes.extend_from_slice(&chunk[..room]);
            body.truncated = true;
            break;
        }
        body.bytes.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// [`limited_body`] decoded lossily as UTF-8, with `[truncated]` appended on
/// its own line when the limit was hit.
pub async fn limited_text(resp: Response, max_bytes: usize) -> Result<String> {
    let body = limited_body(resp, max_bytes).await?;
    let mut text = String::from_utf8_lossy(&body.bytes).into_owned();
    if body.truncated {
        text.push_str("\n[truncated]");
    }
    Ok(text)
}
