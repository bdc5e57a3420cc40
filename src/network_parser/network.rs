//! 平台 HTTP 客户端。
//!
//! 远端服务按黑盒对待：带会话 Cookie 请求各接口，响应统一为
//! `{"h": {"c": 0, "e": ""}, "c": {...}}` 信封。瞬时错误（超时/连接/5xx）
//! 交给退避重试；401/403（登录失效）与 404（未购买/不存在）立即上抛。

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::base_system::context::Config;
use crate::base_system::retry::{BackoffPolicy, with_backoff};
use crate::download::error::DownloadError;
use crate::download::models::{ContentId, ContentRef};

const BASE_URL: &str = "https://www.dedao.cn";
const PAGE_SIZE: usize = 30;

pub struct DedaoNetwork {
    client: Client,
    policy: BackoffPolicy,
}

impl DedaoNetwork {
    pub fn new(cfg: &Config) -> Result<Self, DownloadError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36",
            ),
        );
        let cookie = HeaderValue::from_str(cfg.cookie.trim())
            .map_err(|_| DownloadError::Unauthorized)?;
        headers.insert(COOKIE, cookie);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(cfg.request_timeout.max(1)))
            .build()
            .map_err(DownloadError::from_http)?;

        Ok(Self {
            client,
            policy: BackoffPolicy::from_config(cfg),
        })
    }

    // ── 课程 ────────────────────────────────────────────────────

    pub fn course_info(&self, course_id: u64) -> Result<Value, DownloadError> {
        self.get_json(
            "/pc/bauhinia/pc/class/info",
            &[("detail_id", course_id.to_string())],
        )
    }

    /// 课程文章列表单页；`max_id` 为翻页游标（上一页末尾的文章 ID）。
    pub fn article_list(&self, course_id: u64, max_id: u64) -> Result<Value, DownloadError> {
        self.get_json(
            "/pc/bauhinia/pc/class/purchase/article_list",
            &[
                ("id", course_id.to_string()),
                ("max_id", max_id.to_string()),
                ("count", PAGE_SIZE.to_string()),
            ],
        )
    }

    /// 单篇文章的正文与音频信息。
    pub fn article_detail(&self, article_id: &str) -> Result<Value, DownloadError> {
        self.get_json(
            "/pc/ddarticle/v1/article/get",
            &[("id", article_id.to_string())],
        )
    }

    /// 文章热门留言单页。
    pub fn article_comments(
        &self,
        article_id: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Value, DownloadError> {
        self.get_json(
            "/pc/ledgers/notes/article_comment_list",
            &[
                ("article_id", article_id.to_string()),
                ("page", page.to_string()),
                ("page_size", page_size.to_string()),
            ],
        )
    }

    // ── 每天听本书 ──────────────────────────────────────────────

    pub fn odob_detail(&self, audio_id: u64) -> Result<Value, DownloadError> {
        self.get_json("/pc/odob/v2/audio/detail", &[("id", audio_id.to_string())])
    }

    // ── 电子书 ──────────────────────────────────────────────────

    pub fn ebook_detail(&self, content: &ContentRef) -> Result<Value, DownloadError> {
        match &content.id {
            ContentId::Num(n) => {
                self.get_json("/pc/ebook2/v1/pc/detail", &[("id", n.to_string())])
            }
            ContentId::Enid(enid) => {
                self.get_json("/pc/ebook2/v1/pc/detail", &[("enid", enid.clone())])
            }
        }
    }

    /// 电子书单章正文（HTML 块）。
    pub fn ebook_chapter(&self, enid: &str, chapter_id: &str) -> Result<Value, DownloadError> {
        self.get_json(
            "/pc/ebook2/v1/pc/chapter",
            &[("enid", enid.to_string()), ("chapter_id", chapter_id.to_string())],
        )
    }

    /// 电子书划线/笔记列表单页。
    pub fn ebook_notes(&self, enid: &str, page: usize) -> Result<Value, DownloadError> {
        self.get_json(
            "/pc/ledgers/notes/ebook_note_list",
            &[
                ("enid", enid.to_string()),
                ("page", page.to_string()),
                ("page_size", PAGE_SIZE.to_string()),
            ],
        )
    }

    /// 已购电子书书架单页。
    pub fn ebook_shelf(&self, page: usize) -> Result<Value, DownloadError> {
        self.get_json(
            "/pc/ebook2/v1/pc/bookshelf",
            &[
                ("page", page.to_string()),
                ("page_size", PAGE_SIZE.to_string()),
            ],
        )
    }

    // ── 基础请求 ────────────────────────────────────────────────

    fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, DownloadError> {
        let url = format!("{BASE_URL}{path}");
        with_backoff(&self.policy, path, || {
            debug!(target: "network", %url, "请求接口");
            let resp = self
                .client
                .get(&url)
                .query(params)
                .send()
                .map_err(DownloadError::from_http)?;

            let status = resp.status();
            if !status.is_success() {
                return Err(DownloadError::from_status(
                    status,
                    format!("{path} 返回 {status}"),
                ));
            }

            let value: Value = resp.json().map_err(DownloadError::from_http)?;
            unwrap_envelope(value)
        })
    }
}

/// 剥掉响应信封：`h.c != 0` 为业务错误，成功取 `c`（或 `data`，或原值）。
pub(crate) fn unwrap_envelope(value: Value) -> Result<Value, DownloadError> {
    if let Some(h) = value.get("h") {
        let code = h.get("c").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let msg = h
                .get("e")
                .and_then(Value::as_str)
                .unwrap_or("未知错误")
                .to_string();
            return Err(match code {
                401 | 403 => DownloadError::Unauthorized,
                404 => DownloadError::NotPurchased(msg),
                _ => DownloadError::Fetch(format!("接口错误 {code}: {msg}")),
            });
        }
    }
    if let Some(c) = value.get("c") {
        return Ok(c.clone());
    }
    if let Some(data) = value.get("data") {
        return Ok(data.clone());
    }
    Ok(value)
}

/// 从一页响应中提取列表字段，字段名按候选列表兜底。
pub(crate) fn extract_list(value: &Value, keys: &[&str]) -> Vec<Value> {
    let root = value.get("data").unwrap_or(value);
    for key in keys {
        if let Some(arr) = root.get(*key).and_then(Value::as_array) {
            return arr.clone();
        }
    }
    Vec::new()
}

/// 服务端"还有下一页"标记。缺失时按 false 处理，翻页即止。
pub(crate) fn has_more(value: &Value) -> bool {
    let root = value.get("data").unwrap_or(value);
    for key in ["is_more", "isMore", "has_more", "hasMore"] {
        if let Some(v) = root.get(key) {
            if let Some(b) = v.as_bool() {
                return b;
            }
            if let Some(n) = v.as_i64() {
                return n != 0;
            }
        }
    }
    false
}
