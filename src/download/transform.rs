//! 合并与排序变换。
//!
//! 变换产出一棵新树，原树保持只读。`merge` 只对文字型格式生效：把所有
//! 章节正文按 Ordinal 顺序拼成一个合成章节，留言取并集（同样按 Ordinal
//! 顺序）。纯音频树无法拼接成单个可播放文件，`merge` 视为 no-op。
//! `ordered` 不改动树内容，只影响之后写盘的文件名前缀。

use tracing::warn;

use crate::book_parser::html_generator::escape_html;

use super::models::{Chapter, ContentTree, JobOptions, OutputFormat};

/// 按任务选项变换内容树。
pub(crate) fn transform(tree: ContentTree, opts: &JobOptions, format: OutputFormat) -> ContentTree {
    if !opts.merge {
        return tree;
    }
    if !format.is_text() {
        warn!(target: "download", "音频格式不支持合并章节，忽略 -m");
        return tree;
    }
    if tree.chapters.len() <= 1 {
        return tree;
    }
    merge_chapters(tree)
}

fn merge_chapters(tree: ContentTree) -> ContentTree {
    let mut body = String::new();
    let mut comments = Vec::new();

    for ch in &tree.chapters {
        body.push_str(&format!("<h2>{}</h2>\n", escape_html(&ch.title)));
        if let Some(text) = &ch.text {
            body.push_str(text);
            body.push('\n');
        }
        comments.extend(ch.comments.iter().cloned());
    }

    let merged = Chapter {
        id: tree.root_id.clone(),
        title: tree.title.clone(),
        ordinal: 1,
        audio_url: None,
        text: Some(body),
        comments,
    };

    ContentTree {
        title: tree.title.clone(),
        root_id: tree.root_id,
        chapters: vec![merged],
    }
}

/// `ordered` 输出的序号前缀宽度：至少 3 位，章节更多时按位数加宽。
pub(crate) fn ordinal_width(chapter_count: usize) -> usize {
    let digits = chapter_count.max(1).to_string().len();
    digits.max(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::models::Comment;

    fn chapter(ordinal: usize, title: &str, comment_count: usize) -> Chapter {
        Chapter {
            id: format!("c{ordinal}"),
            title: title.to_string(),
            ordinal,
            audio_url: None,
            text: Some(format!("<p>{title} 的内容</p>")),
            comments: (0..comment_count)
                .map(|i| Comment {
                    author: format!("用户{i}"),
                    body: format!("{title} 留言 {i}"),
                    like_count: i as u64,
                })
                .collect(),
        }
    }

    fn tree() -> ContentTree {
        ContentTree {
            title: "示例课程".to_string(),
            root_id: "555".to_string(),
            chapters: vec![chapter(1, "A", 2), chapter(2, "B", 2), chapter(3, "C", 2)],
        }
    }

    #[test]
    fn merge_collapses_to_single_chapter_with_comment_union() {
        let opts = JobOptions {
            merge: true,
            include_comments: true,
            ordered: false,
        };
        let merged = transform(tree(), &opts, OutputFormat::Markdown);
        assert_eq!(merged.chapters.len(), 1);
        let ch = &merged.chapters[0];
        assert_eq!(ch.title, "示例课程");
        assert_eq!(ch.comments.len(), 6, "留言并集等于各章留言数之和");
        // 留言按章节 Ordinal 顺序串联
        assert_eq!(ch.comments[0].body, "A 留言 0");
        assert_eq!(ch.comments[5].body, "C 留言 1");
        let text = ch.text.as_deref().unwrap();
        let (a, b, c) = (
            text.find("<h2>A</h2>").unwrap(),
            text.find("<h2>B</h2>").unwrap(),
            text.find("<h2>C</h2>").unwrap(),
        );
        assert!(a < b && b < c, "正文按 Ordinal 顺序拼接");
    }

    #[test]
    fn merge_is_noop_for_audio() {
        let opts = JobOptions {
            merge: true,
            include_comments: false,
            ordered: false,
        };
        let out = transform(tree(), &opts, OutputFormat::Mp3);
        assert_eq!(out.chapters.len(), 3);
    }

    #[test]
    fn no_merge_keeps_tree_intact() {
        let out = transform(tree(), &JobOptions::default(), OutputFormat::Markdown);
        assert_eq!(out.chapters.len(), 3);
        assert_eq!(out.chapters[2].ordinal, 3);
    }

    #[test]
    fn single_chapter_merge_is_identity() {
        let one = ContentTree {
            title: "t".into(),
            root_id: "1".into(),
            chapters: vec![chapter(1, "A", 0)],
        };
        let opts = JobOptions {
            merge: true,
            ..JobOptions::default()
        };
        let out = transform(one, &opts, OutputFormat::Markdown);
        assert_eq!(out.chapters[0].title, "A");
    }

    #[test]
    fn ordinal_width_grows_with_chapter_count() {
        assert_eq!(ordinal_width(0), 3);
        assert_eq!(ordinal_width(9), 3);
        assert_eq!(ordinal_width(999), 3);
        assert_eq!(ordinal_width(1000), 4);
    }
}
