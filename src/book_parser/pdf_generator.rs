//! PDF 输出：headless Chrome 的 print-to-PDF。
//!
//! 正文先写成临时 HTML 页面，再交给 Chrome 打印，排版（分页、CJK 字体）
//! 与浏览器一致。图片与音频引用在打印时被忽略。

use std::io::Write as _;
use std::path::PathBuf;

use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use tracing::debug;

use crate::download::error::DownloadError;

pub(crate) struct PdfRenderer {
    browser: Browser,
}

impl PdfRenderer {
    /// 启动 headless Chrome；`chrome_path` 为空时自动查找。
    pub(crate) fn new(chrome_path: &str) -> Result<Self, DownloadError> {
        let path = {
            let trimmed = chrome_path.trim();
            (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
        };
        let options = LaunchOptions::default_builder()
            .headless(true)
            .path(path)
            .build()
            .map_err(|e| engine_error(e.to_string()))?;
        let browser = Browser::new(options).map_err(|e| engine_error(e.to_string()))?;
        Ok(Self { browser })
    }

    /// 渲染一篇 HTML 文档为 PDF 字节。
    pub(crate) fn render_html(&self, title: &str, html: &str) -> Result<Vec<u8>, DownloadError> {
        let render_err = |reason: String| DownloadError::Render {
            chapter: title.to_string(),
            reason,
        };

        let mut staged = tempfile::Builder::new()
            .prefix("dedao-pdf-")
            .suffix(".html")
            .tempfile()
            .map_err(|e| render_err(e.to_string()))?;
        staged
            .write_all(html.as_bytes())
            .and_then(|_| staged.flush())
            .map_err(|e| render_err(e.to_string()))?;

        let url = format!("file://{}", staged.path().display());
        debug!(target: "render", %url, "打印 PDF");

        let tab = self.browser.new_tab().map_err(|e| render_err(e.to_string()))?;
        let result = tab
            .navigate_to(&url)
            .and_then(|t| t.wait_until_navigated())
            .and_then(|t| {
                t.print_to_pdf(Some(PrintToPdfOptions {
                    print_background: Some(true),
                    ..Default::default()
                }))
            })
            .map_err(|e| render_err(e.to_string()));
        let _ = tab.close(true);
        result
    }
}

fn engine_error(detail: String) -> DownloadError {
    DownloadError::Render {
        chapter: "PDF 引擎".to_string(),
        reason: format!("启动 Chrome 失败（可在 config.yml 配置 chrome_path）: {detail}"),
    }
}
