//! 电子书 HTML 输出与 XHTML 页面包装。

pub(crate) fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// 把章节正文包成完整的 XHTML 文档。
pub(crate) fn wrap_chapter_html(title: &str, body: &str) -> String {
    let escaped_title = escape_html(title);
    format!(
        "<?xml version='1.0' encoding='utf-8'?>\n<!DOCTYPE html>\n<html xmlns=\"http://www.w3.org/1999/xhtml\" lang=\"zh\" xml:lang=\"zh\">\n  <head>\n    <title>{}</title>\n  </head>\n  <body><h1>{}</h1>\n{}\n  </body>\n</html>",
        escaped_title, escaped_title, body
    )
}

/// PDF 打印用的独立 HTML 文档，内联少量排版样式。
pub(crate) fn printable_html(title: &str, body: &str) -> String {
    let escaped_title = escape_html(title);
    format!(
        "<!DOCTYPE html>\n<html lang=\"zh\">\n<head>\n<meta charset=\"utf-8\"/>\n<title>{}</title>\n<style>\nbody {{ font-family: serif; line-height: 1.6; margin: 2em; }}\nh1 {{ font-size: 1.6em; }}\nh2 {{ font-size: 1.3em; border-bottom: 1px solid #ddd; padding-bottom: .2em; }}\nblockquote {{ color: #555; border-left: 3px solid #ccc; margin-left: 0; padding-left: 1em; }}\n.comment {{ border-top: 1px dashed #ccc; padding: .5em 0; }}\n.comment small {{ color: #888; }}\n</style>\n</head>\n<body>\n<h1>{}</h1>\n{}\n</body>\n</html>",
        escaped_title, escaped_title, body
    )
}

/// 渲染留言区块（HTML 形态，供 HTML/PDF 输出复用）。
pub(crate) fn comments_html(comments: &[crate::download::models::Comment]) -> String {
    if comments.is_empty() {
        return String::new();
    }
    let mut out = String::from("<h2>热门留言</h2>\n");
    for c in comments {
        out.push_str(&format!(
            "<div class=\"comment\"><p>{}</p><small>{} | 赞：{}</small></div>\n",
            escape_html(&c.body),
            escape_html(&c.author),
            c.like_count
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html("<b>\"粗体\" & '引号'</b>"),
            "&lt;b&gt;&quot;粗体&quot; &amp; &#39;引号&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn wraps_body_with_title_heading() {
        let html = wrap_chapter_html("第一章", "<p>内容</p>");
        assert!(html.contains("<title>第一章</title>"));
        assert!(html.contains("<h1>第一章</h1>"));
        assert!(html.contains("<p>内容</p>"));
    }
}
