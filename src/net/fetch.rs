use serde::Serialize;

use crate::net::Response;

/// POSTs `body` as JSON to `url` and buffers the response.
///
/// Only transport failures are errors; any HTTP status is returned as a
/// [`Response`] for the caller to inspect.
pub async fn post_json<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: url::Url,
    body: &B,
) -> Result<Response, reqwest::Error> {
    let res = client.post(url).json(body).send().await?;

    let status = res.status().as_u16();
    let status_text = res.status().canonical_reason().unwrap_or("Unknown").to_string();
    let headers = res.headers().clone();

    // Fetch body. We don't do streaming
    let body = res.bytes().await?.to_vec();

    Ok(Response {
        status,
        status_text,
        headers,
        body,
    })
}
