//! 音频直通下载：把章节的音频地址原样落到本地文件，不做转码。

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use tracing::debug;

use crate::download::error::DownloadError;

/// 音频在 CDN 上，无需会话 Cookie；独立客户端加长超时。
pub(crate) fn audio_client(timeout_secs: u64) -> Result<Client, DownloadError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(30)))
        .build()
        .map_err(DownloadError::from_http)
}

/// 把音频流写入目标目录下的暂存文件，成功后由写入器改名落位。
/// 暂存文件在出错路径上随 RAII 自动清理。
pub(crate) fn download_audio(
    client: &Client,
    title: &str,
    url: &str,
    dest_dir: &Path,
    cancel: &Arc<AtomicBool>,
) -> Result<tempfile::NamedTempFile, DownloadError> {
    let render_err = |reason: String| DownloadError::Render {
        chapter: title.to_string(),
        reason,
    };

    if cancel.load(Ordering::Relaxed) {
        return Err(DownloadError::Canceled);
    }

    debug!(target: "render", %url, "下载音频");
    let resp = client
        .get(url)
        .header(USER_AGENT, "Mozilla/5.0")
        .send()
        .map_err(DownloadError::from_http)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(DownloadError::from_status(
            status,
            format!("音频地址返回 {status}"),
        ));
    }

    let mut staged = tempfile::Builder::new()
        .prefix(".audio-")
        .tempfile_in(dest_dir)
        .map_err(|e| render_err(e.to_string()))?;

    let mut reader = resp;
    io::copy(&mut reader, staged.as_file_mut()).map_err(|e| render_err(e.to_string()))?;

    if cancel.load(Ordering::Relaxed) {
        return Err(DownloadError::Canceled);
    }
    Ok(staged)
}
