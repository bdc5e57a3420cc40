//! 内容标识解析与规范化。
//!
//! 纯数字参数解析为平台数字 ID；其余输入只有允许 enid 的种类（电子书/笔记）
//! 才接受。纯数字的 enid 用 `enid:` 前缀强制按对外 ID 处理，避免与数字 ID
//! 的启发式判断冲突。

use super::error::DownloadError;
use super::models::{ContentId, ContentRef, Kind};

const ENID_PREFIX: &str = "enid:";

/// 把命令行原始参数解析为类型化的 [`ContentRef`]。
pub fn resolve(raw: &str, kind: Kind) -> Result<ContentRef, DownloadError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DownloadError::InvalidIdentifier("ID 不能为空".to_string()));
    }

    if let Some(rest) = trimmed.strip_prefix(ENID_PREFIX) {
        if !kind.allows_enid() {
            return Err(DownloadError::InvalidIdentifier(format!(
                "该内容类型不支持 enid 寻址: {trimmed}"
            )));
        }
        if rest.is_empty() {
            return Err(DownloadError::InvalidIdentifier("ID 不能为空".to_string()));
        }
        return Ok(ContentRef {
            kind,
            id: ContentId::Enid(rest.to_string()),
        });
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        let num = trimmed
            .parse::<u64>()
            .map_err(|_| DownloadError::InvalidIdentifier(format!("ID 超出范围: {trimmed}")))?;
        return Ok(ContentRef {
            kind,
            id: ContentId::Num(num),
        });
    }

    if kind.allows_enid() {
        return Ok(ContentRef {
            kind,
            id: ContentId::Enid(trimmed.to_string()),
        });
    }

    Err(DownloadError::InvalidIdentifier(format!(
        "ID 必须为数字: {trimmed}"
    )))
}
