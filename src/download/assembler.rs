//! 内容树组装。
//!
//! 纯转换：把抓取到的原始记录映射为 [`Chapter`]/[`Comment`]，保留服务端
//! 给出的 Ordinal。音频与正文都缺失的章节整章丢弃并计数，不让单章拖垮
//! 整个任务。

use serde_json::Value;
use tracing::warn;

use super::models::{Chapter, Comment, ContentTree};

/// 抓取阶段产出的单章原始数据，组装前的中间形态。
#[derive(Debug, Clone, Default)]
pub(crate) struct RawChapter {
    pub id: String,
    pub title: String,
    pub ordinal: usize,
    pub audio_url: Option<String>,
    pub text: Option<String>,
    pub comments: Vec<Value>,
}

/// 组装内容树；返回 (树, 丢弃章节数)。
pub(crate) fn assemble(title: &str, root_id: &str, raws: Vec<RawChapter>) -> (ContentTree, usize) {
    let mut chapters = Vec::with_capacity(raws.len());
    let mut dropped = 0usize;

    for raw in raws {
        let has_audio = raw.audio_url.as_deref().is_some_and(|u| !u.trim().is_empty());
        let has_text = raw.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        if !has_audio && !has_text {
            warn!(target: "download", id = %raw.id, title = %raw.title, "章节无可用内容，跳过");
            dropped += 1;
            continue;
        }

        let comments = raw.comments.iter().filter_map(parse_comment).collect();
        chapters.push(Chapter {
            id: raw.id,
            title: raw.title,
            ordinal: raw.ordinal,
            audio_url: raw.audio_url.filter(|u| !u.trim().is_empty()),
            text: raw.text.filter(|t| !t.trim().is_empty()),
            comments,
        });
    }

    (
        ContentTree {
            title: title.to_string(),
            root_id: root_id.to_string(),
            chapters,
        },
        dropped,
    )
}

/// 从一条留言记录里解析作者/内容/点赞数，字段名按候选列表兜底。
pub(crate) fn parse_comment(value: &Value) -> Option<Comment> {
    let obj = value.as_object()?;
    let body = pick_string(obj, &["content", "note", "body", "comment"])?;
    let author = pick_string(obj, &["nickname", "user_name", "author", "student_name"])
        .unwrap_or_else(|| "匿名".to_string());
    let like_count = pick_u64(obj, &["like_count", "digg_count", "count", "likes"]).unwrap_or(0);
    Some(Comment {
        author,
        body,
        like_count,
    })
}

pub(crate) fn pick_string(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(val) = map.get(*key) {
            if let Some(s) = val.as_str() {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            } else if let Some(n) = val.as_i64() {
                return Some(n.to_string());
            }
        }
    }
    None
}

pub(crate) fn pick_u64(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<u64> {
    for key in keys {
        if let Some(val) = map.get(*key) {
            if let Some(n) = val.as_u64() {
                return Some(n);
            }
            if let Some(s) = val.as_str() {
                if let Ok(n) = s.trim().parse::<u64>() {
                    return Some(n);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(id: &str, ordinal: usize, audio: Option<&str>, text: Option<&str>) -> RawChapter {
        RawChapter {
            id: id.to_string(),
            title: format!("第{ordinal}讲"),
            ordinal,
            audio_url: audio.map(|s| s.to_string()),
            text: text.map(|s| s.to_string()),
            comments: Vec::new(),
        }
    }

    #[test]
    fn drops_payloadless_chapter_and_counts_it() {
        let raws = vec![
            raw("a", 1, Some("https://cdn/a.mp3"), None),
            raw("b", 2, None, None),
            raw("c", 3, None, Some("<p>正文</p>")),
        ];
        let (tree, dropped) = assemble("测试课", "100", raws);
        assert_eq!(dropped, 1);
        assert_eq!(tree.chapters.len(), 2);
        assert_eq!(tree.chapters[0].ordinal, 1);
        assert_eq!(tree.chapters[1].ordinal, 3, "Ordinal 保持服务端取值");
    }

    #[test]
    fn blank_payloads_count_as_missing() {
        let raws = vec![raw("a", 1, Some("   "), Some(""))];
        let (tree, dropped) = assemble("t", "1", raws);
        assert!(tree.chapters.is_empty());
        assert_eq!(dropped, 1);
    }

    #[test]
    fn parses_comments_with_candidate_keys() {
        let c = parse_comment(&json!({
            "nickname": "张三",
            "content": "讲得太好了",
            "like_count": 12
        }))
        .unwrap();
        assert_eq!(c.author, "张三");
        assert_eq!(c.like_count, 12);

        let c = parse_comment(&json!({
            "user_name": "李四",
            "note": "受教了",
            "digg_count": "7"
        }))
        .unwrap();
        assert_eq!(c.author, "李四");
        assert_eq!(c.like_count, 7);
    }

    #[test]
    fn comment_without_body_is_ignored() {
        assert!(parse_comment(&json!({"nickname": "张三"})).is_none());
    }

    #[test]
    fn comments_attach_to_their_chapter() {
        let mut ch = raw("a", 1, None, Some("x"));
        ch.comments = vec![
            json!({"nickname": "甲", "content": "1", "like_count": 1}),
            json!({"nickname": "乙", "content": "2", "like_count": 2}),
        ];
        let (tree, _) = assemble("t", "1", vec![ch]);
        assert_eq!(tree.chapters[0].comments.len(), 2);
        assert_eq!(tree.chapters[0].comments[1].author, "乙");
    }
}
