//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息，以及文件名清洗工具。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 会话配置
    #[serde(default)]
    pub cookie: String,

    // 网络配置
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_min_wait_time")]
    pub min_wait_time: u64,
    #[serde(default = "default_max_wait_time")]
    pub max_wait_time: u64,

    // 保存配置
    #[serde(default)]
    pub save_path: String,
    #[serde(default = "default_comments_per_chapter")]
    pub comments_per_chapter: usize,

    // PDF 配置
    #[serde(default)]
    pub chrome_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cookie: String::new(),
            max_workers: default_max_workers(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            min_wait_time: default_min_wait_time(),
            max_wait_time: default_max_wait_time(),
            save_path: String::new(),
            comments_per_chapter: default_comments_per_chapter(),
            chrome_path: String::new(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 9] = [
            FieldMeta {
                name: "cookie",
                description: "登录后的会话 Cookie（浏览器开发者工具中复制，必填）",
            },
            FieldMeta {
                name: "max_workers",
                description: "章节并发下载线程数",
            },
            FieldMeta {
                name: "request_timeout",
                description: "请求超时时间（秒）",
            },
            FieldMeta {
                name: "max_retries",
                description: "瞬时错误的最大重试次数",
            },
            FieldMeta {
                name: "min_wait_time",
                description: "重试起始等待时间, 单位ms",
            },
            FieldMeta {
                name: "max_wait_time",
                description: "重试等待时间上限, 单位ms",
            },
            FieldMeta {
                name: "save_path",
                description: "下载文件保存目录, 留空表示 ./output",
            },
            FieldMeta {
                name: "comments_per_chapter",
                description: "每章最多下载的热门留言条数",
            },
            FieldMeta {
                name: "chrome_path",
                description: "Chrome/Chromium 可执行文件路径（PDF 输出用，留空自动查找）",
            },
        ];
        &FIELDS
    }
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            PathBuf::from("output")
        } else {
            PathBuf::from(self.save_path.trim())
        }
    }

    pub fn has_session(&self) -> bool {
        !self.cookie.trim().is_empty()
    }
}

pub fn safe_fs_name(name: &str, replacement: &str, max_len: usize) -> String {
    let mut cleaned: String = name
        .chars()
        .map(|ch| match ch {
            // Convert forbidden Windows filename characters to Chinese equivalents
            ':' => '：',
            '"' => '“',
            '<' => '《',
            '>' => '》',
            '/' | '\\' => '、',
            '|' => '｜',
            '?' => '？',
            '*' => '＊',
            c if (c as u32) < 32 => replacement.chars().next().unwrap_or('_'),
            _ => ch,
        })
        .collect();

    while cleaned.ends_with(' ') || cleaned.ends_with('.') {
        cleaned.pop();
    }

    if cleaned.is_empty() {
        cleaned.push_str("unnamed");
    }

    const RESERVED: [&str; 22] = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    let upper = cleaned.to_uppercase();
    if RESERVED.contains(&upper.as_str()) {
        cleaned = format!("_{}", cleaned);
    }

    if cleaned.len() > max_len {
        // 避免在多字节 UTF-8 字符（如中文）中间截断导致 panic
        let mut end = max_len;
        while !cleaned.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        cleaned.truncate(end);
        while cleaned.ends_with(' ') || cleaned.ends_with('.') {
            cleaned.pop();
        }
        if cleaned.is_empty() {
            cleaned.push_str("unnamed");
        }
    }

    cleaned
}

fn default_max_workers() -> usize {
    4
}

fn default_request_timeout() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    3
}

fn default_min_wait_time() -> u64 {
    800
}

fn default_max_wait_time() -> u64 {
    8000
}

fn default_comments_per_chapter() -> usize {
    20
}
