//! Markdown 输出。
//!
//! 平台返回的正文是富文本 HTML；这里用正则做轻量转换（与其余清洗逻辑
//! 一致，不为此引入完整的 HTML 解析器），标题/列表/引用/强调/图片/链接
//! 按 Markdown 语法改写，其余标签剥除。

use std::sync::OnceLock;

use regex::Regex;

use crate::download::models::{Chapter, Comment};

macro_rules! cached_re {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect(concat!("compile ", stringify!($name))))
        }
    };
}

cached_re!(re_script, r"(?is)<(script|style|header)[^>]*>.*?</(script|style|header)>");
cached_re!(re_heading, r"(?is)<h([1-6])[^>]*>(.*?)</h[1-6]>");
cached_re!(re_blockquote, r"(?is)<blockquote[^>]*>(.*?)</blockquote>");
cached_re!(re_list_item, r"(?is)<li[^>]*>(.*?)</li>");
cached_re!(re_strong, r"(?is)<(strong|b)[^>]*>(.*?)</(strong|b)>");
cached_re!(re_em, r"(?is)<(em|i)[^>]*>(.*?)</(em|i)>");
cached_re!(re_img, r#"(?is)<img[^>]*src=["']([^"']+)["'][^>]*>"#);
cached_re!(re_link, r#"(?is)<a[^>]*href=["']([^"']+)["'][^>]*>(.*?)</a>"#);
cached_re!(re_br, r"(?is)<br\s*/?>");
cached_re!(re_para_close, r"(?is)</(p|div)>");
cached_re!(re_tag, r"<[^>]+>");
cached_re!(re_blank_lines, r"\n{3,}");

/// 富文本 HTML → Markdown。
pub(crate) fn html_to_markdown(html: &str) -> String {
    let mut s = html.replace("\r\n", "\n").replace('\r', "\n");
    s = re_script().replace_all(&s, "").to_string();

    s = re_heading()
        .replace_all(&s, |caps: &regex::Captures<'_>| {
            let level: usize = caps[1].parse().unwrap_or(1);
            format!("\n{} {}\n\n", "#".repeat(level), strip_tags(&caps[2]))
        })
        .to_string();

    s = re_blockquote()
        .replace_all(&s, |caps: &regex::Captures<'_>| {
            let inner = strip_tags(&caps[1]);
            let quoted: Vec<String> = inner
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| format!("> {}", l.trim()))
                .collect();
            format!("\n{}\n\n", quoted.join("\n"))
        })
        .to_string();

    s = re_list_item()
        .replace_all(&s, |caps: &regex::Captures<'_>| {
            format!("\n- {}", strip_tags(&caps[1]).trim().to_string())
        })
        .to_string();

    s = re_strong().replace_all(&s, "**$2**").to_string();
    s = re_em().replace_all(&s, "*$2*").to_string();
    s = re_img().replace_all(&s, "![]($1)").to_string();
    s = re_link().replace_all(&s, "[$2]($1)").to_string();
    s = re_br().replace_all(&s, "\n").to_string();
    s = re_para_close().replace_all(&s, "\n\n").to_string();
    s = re_tag().replace_all(&s, "").to_string();

    let s = unescape_entities(&s);
    let s = re_blank_lines().replace_all(&s, "\n\n").to_string();
    s.trim().to_string()
}

/// 单章 Markdown 文档：标题 + 正文 +（可选）留言区。
pub(crate) fn chapter_markdown(chapter: &Chapter, include_comments: bool) -> String {
    let mut out = format!("# {}\n\n", chapter.title);
    if let Some(text) = &chapter.text {
        out.push_str(&html_to_markdown(text));
        out.push('\n');
    }
    if include_comments && !chapter.comments.is_empty() {
        out.push('\n');
        out.push_str(&comments_section(&chapter.comments));
    }
    out
}

/// 留言区：作者/内容/点赞数逐条列出。
pub(crate) fn comments_section(comments: &[Comment]) -> String {
    let mut out = String::from("## 热门留言\n\n");
    for c in comments {
        out.push_str(&format!(
            "- **{}**（赞 {}）：{}\n",
            c.author,
            c.like_count,
            c.body.replace('\n', " ")
        ));
    }
    out
}

fn strip_tags(s: &str) -> String {
    re_tag().replace_all(s, "").trim().to_string()
}

fn unescape_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
