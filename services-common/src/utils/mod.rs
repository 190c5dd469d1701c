use anyhow::{bail, Context};
use reqwest::Response;
use serde::de::DeserializeOwned;

pub mod limiter;
pub mod period_fetch;
pub mod tests;

/// Decodes type from json or return err with raw body info.
pub async fn decode_response_type_or_raw<T: DeserializeOwned>(
    response: Response,
) -> anyhow::Result<T> {
    let status = response.status();
    let bytes = response.bytes().await?;
    decode_type_or_raw(&bytes).with_context(|| format!("status: {status}"))
}

/// Same as [`decode_response_type_or_raw`], but treats non-success statuses as errors.
pub async fn decode_success_or_raw<T: DeserializeOwned>(response: Response) -> anyhow::Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("upstream responded with {status}: {body}");
    }
    decode_response_type_or_raw(response).await
}

pub fn decode_type_or_raw<T: DeserializeOwned>(data: impl AsRef<[u8]>) -> anyhow::Result<T> {
    let bytes = data.as_ref();
    match serde_json::from_slice::<T>(bytes) {
        Ok(response) => Ok(response),
        Err(err) => {
            bail!(
                "failed to decode to json response: {err:?}, raw body: {:?}",
                String::from_utf8_lossy(bytes)
            )
        }
    }
}
