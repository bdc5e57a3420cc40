//! 下载流程的错误分类。
//!
//! 面向用户的消息全部为本地化的可操作文案；`retryable()` 决定退避重试，
//! 确定性失败（未购买/登录失效/ID 错误）一律立即上抛。

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::base_system::retry::Retryable;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{0}")]
    InvalidIdentifier(String),

    #[error("登录信息无效或已过期，请重新获取 Cookie 并更新 config.yml")]
    Unauthorized,

    #[error("未购买该内容或无权访问: {0}")]
    NotPurchased(String),

    #[error("网络请求失败: {0}")]
    Transient(String),

    #[error("获取内容失败: {0}")]
    Fetch(String),

    #[error("章节「{chapter}」渲染失败: {reason}")]
    Render { chapter: String, reason: String },

    #[error("写入文件失败 {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("用户取消下载")]
    Canceled,

    #[error("批量下载结束: 成功 {ok} 本, 失败 {}: {}", failed.len(), failed.join("、"))]
    Bulk { ok: usize, failed: Vec<String> },
}

impl Retryable for DownloadError {
    fn retryable(&self) -> bool {
        matches!(self, DownloadError::Transient(_))
    }
}

impl DownloadError {
    /// reqwest 层错误分类：超时/连接问题视为瞬时，其余按响应状态处理。
    pub fn from_http(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return DownloadError::Transient(err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::from_status(status, err.to_string());
        }
        DownloadError::Fetch(err.to_string())
    }

    /// HTTP 状态码分类：401/403 → 登录失效，404 → 未购买/不存在，5xx → 瞬时。
    pub fn from_status(status: reqwest::StatusCode, detail: String) -> Self {
        match status.as_u16() {
            401 | 403 => DownloadError::Unauthorized,
            404 => DownloadError::NotPurchased(detail),
            500..=599 => DownloadError::Transient(format!("服务端错误 {status}")),
            _ => DownloadError::Fetch(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn only_transient_is_retryable() {
        assert!(DownloadError::Transient("timeout".into()).retryable());
        assert!(!DownloadError::Unauthorized.retryable());
        assert!(!DownloadError::NotPurchased("x".into()).retryable());
        assert!(!DownloadError::InvalidIdentifier("x".into()).retryable());
        assert!(!DownloadError::Fetch("x".into()).retryable());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            DownloadError::from_status(StatusCode::UNAUTHORIZED, String::new()),
            DownloadError::Unauthorized
        ));
        assert!(matches!(
            DownloadError::from_status(StatusCode::FORBIDDEN, String::new()),
            DownloadError::Unauthorized
        ));
        assert!(matches!(
            DownloadError::from_status(StatusCode::NOT_FOUND, String::new()),
            DownloadError::NotPurchased(_)
        ));
        assert!(matches!(
            DownloadError::from_status(StatusCode::BAD_GATEWAY, String::new()),
            DownloadError::Transient(_)
        ));
    }

    #[test]
    fn bulk_message_lists_failures() {
        let err = DownloadError::Bulk {
            ok: 2,
            failed: vec!["书A".to_string(), "书B".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("成功 2 本"));
        assert!(msg.contains("书A"));
        assert!(msg.contains("书B"));
    }
}
