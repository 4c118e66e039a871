//! Per-provider upload requests and response envelopes
//!
//! Each provider speaks its own contract:
//! - gofile.io: multipart POST, JSON envelope with a `downloadPage` link
//! - buzzheavier.com: raw PUT to the file name, JSON envelope with an id
//! - pixeldrain.com: raw PUT to the anonymous file API, JSON with an id
//!
//! All three stream the file from disk instead of buffering it; payloads
//! run to gigabytes.

use crate::config::UploadConfig;
use crate::error::{Result, UploadError};
use crate::types::ProviderKind;
use serde::Deserialize;
use std::path::Path;
use tokio_util::io::ReaderStream;

/// gofile.io success envelope
#[derive(Debug, Deserialize)]
struct GoFileResponse {
    status: String,
    data: Option<GoFileData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoFileData {
    download_page: String,
}

/// buzzheavier.com success envelope
#[derive(Debug, Deserialize)]
struct BuzzHeavierResponse {
    code: u32,
    data: Option<BuzzHeavierData>,
}

#[derive(Debug, Deserialize)]
struct BuzzHeavierData {
    id: String,
}

/// pixeldrain.com success envelope
#[derive(Debug, Deserialize)]
struct PixelDrainResponse {
    id: String,
}

/// Upload one file to one provider, returning the public download link
pub(crate) async fn upload_to(
    client: &reqwest::Client,
    config: &UploadConfig,
    provider: ProviderKind,
    path: &Path,
    file_name: &str,
    size: u64,
) -> Result<String> {
    match provider {
        ProviderKind::GoFile => gofile(client, config, path, file_name, size).await,
        ProviderKind::BuzzHeavier => buzzheavier(client, config, path, file_name).await,
        ProviderKind::PixelDrain => pixeldrain(client, config, path, file_name).await,
    }
}

fn provider_error(provider: ProviderKind, reason: impl Into<String>) -> UploadError {
    UploadError::Provider {
        provider,
        reason: reason.into(),
    }
}

async fn file_body(path: &Path) -> Result<reqwest::Body> {
    let file = tokio::fs::File::open(path).await?;
    Ok(reqwest::Body::wrap_stream(ReaderStream::new(file)))
}

async fn gofile(
    client: &reqwest::Client,
    config: &UploadConfig,
    path: &Path,
    file_name: &str,
    size: u64,
) -> Result<String> {
    let provider = ProviderKind::GoFile;
    let url = format!("{}/uploadFile", config.gofile_base.trim_end_matches('/'));

    let part = reqwest::multipart::Part::stream_with_length(file_body(path).await?, size)
        .file_name(file_name.to_string());
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = client
        .post(&url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| provider_error(provider, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(provider_error(provider, format!("HTTP {status}")).into());
    }

    let envelope: GoFileResponse = response
        .json()
        .await
        .map_err(|e| provider_error(provider, format!("unparseable response: {e}")))?;

    if envelope.status != "ok" {
        return Err(provider_error(
            provider,
            format!("response status was {:?}", envelope.status),
        )
        .into());
    }
    envelope
        .data
        .map(|d| d.download_page)
        .ok_or_else(|| provider_error(provider, "response had no download page").into())
}

async fn buzzheavier(
    client: &reqwest::Client,
    config: &UploadConfig,
    path: &Path,
    file_name: &str,
) -> Result<String> {
    let provider = ProviderKind::BuzzHeavier;
    let url = format!(
        "{}/{}",
        config.buzzheavier_base.trim_end_matches('/'),
        urlencoding::encode(file_name)
    );

    let response = client
        .put(&url)
        .body(file_body(path).await?)
        .send()
        .await
        .map_err(|e| provider_error(provider, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(provider_error(provider, format!("HTTP {status}")).into());
    }

    let envelope: BuzzHeavierResponse = response
        .json()
        .await
        .map_err(|e| provider_error(provider, format!("unparseable response: {e}")))?;

    if !(200..300).contains(&envelope.code) {
        return Err(provider_error(provider, format!("response code {}", envelope.code)).into());
    }
    envelope
        .data
        .map(|d| format!("https://buzzheavier.com/{}", d.id))
        .ok_or_else(|| provider_error(provider, "response had no file id").into())
}

async fn pixeldrain(
    client: &reqwest::Client,
    config: &UploadConfig,
    path: &Path,
    file_name: &str,
) -> Result<String> {
    let provider = ProviderKind::PixelDrain;
    let base = config.pixeldrain_base.trim_end_matches('/');
    let url = format!("{}/api/file/{}", base, urlencoding::encode(file_name));

    let response = client
        .put(&url)
        .body(file_body(path).await?)
        .send()
        .await
        .map_err(|e| provider_error(provider, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(provider_error(provider, format!("HTTP {status}")).into());
    }

    let envelope: PixelDrainResponse = response
        .json()
        .await
        .map_err(|e| provider_error(provider, format!("unparseable response: {e}")))?;

    Ok(format!("{}/u/{}", base, envelope.id))
}
