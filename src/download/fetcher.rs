//! 远端内容抓取。
//!
//! 负责把一个 [`ContentRef`] 变成完整的原始章节集合：先拉顶层元数据与
//! 章节列表（列表可能分页，翻到服务端说没有为止，顺序以服务端为准），
//! 再通过工作池并发拉取每章的正文/音频，按需拉取热门留言。
//! 除对外网络请求外无副作用，不落盘。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::base_system::context::Config;
use crate::network_parser::network::{DedaoNetwork, extract_list, has_more};

use super::assembler::{RawChapter, assemble, pick_string, pick_u64};
use super::error::DownloadError;
use super::models::{ContentId, ContentRef, ContentTree, Kind};
use super::worker_pool::run_pool;

pub(crate) struct Fetcher<'a> {
    net: &'a DedaoNetwork,
    cfg: &'a Config,
    cancel: Arc<AtomicBool>,
}

impl<'a> Fetcher<'a> {
    pub(crate) fn new(net: &'a DedaoNetwork, cfg: &'a Config, cancel: Arc<AtomicBool>) -> Self {
        Self { net, cfg, cancel }
    }

    /// 抓取内容树；返回 (树, 丢弃章节数)。
    pub(crate) fn fetch_tree(
        &self,
        content: &ContentRef,
        include_comments: bool,
        article_id: Option<u64>,
    ) -> Result<(ContentTree, usize), DownloadError> {
        match content.kind {
            Kind::Course => self.fetch_course(content, include_comments, article_id),
            Kind::Odob => self.fetch_odob(content),
            Kind::Ebook => self.fetch_ebook(content),
            Kind::EbookNotes => {
                let tree = self.fetch_notes_tree(content)?;
                Ok((tree, 0))
            }
        }
    }

    // ── 课程 ────────────────────────────────────────────────────

    fn fetch_course(
        &self,
        content: &ContentRef,
        include_comments: bool,
        article_id: Option<u64>,
    ) -> Result<(ContentTree, usize), DownloadError> {
        let &ContentId::Num(course_id) = &content.id else {
            return Err(DownloadError::InvalidIdentifier("课程ID错误".to_string()));
        };

        let info = self.net.course_info(course_id)?;
        let maps = collect_maps(&info);
        let title = maps
            .iter()
            .find_map(|m| pick_string(m, &["name", "title", "class_name"]))
            .unwrap_or_else(|| course_id.to_string());
        info!(target: "download", course_id, %title, "获取课程目录");

        // 文章列表按 max_id 游标翻页，直到服务端不再返回更多。
        let mut entries: Vec<Value> = Vec::new();
        let mut max_id: u64 = 0;
        loop {
            self.check_cancel()?;
            let page = self.net.article_list(course_id, max_id)?;
            let list = extract_list(&page, &["article_list", "list", "articles"]);
            if list.is_empty() {
                break;
            }
            if let Some(last_id) = list
                .last()
                .and_then(|v| v.as_object())
                .and_then(|m| pick_u64(m, &["id", "article_id", "aid"]))
            {
                max_id = last_id;
            }
            let page_len = list.len();
            entries.extend(list);
            debug!(target: "download", fetched = entries.len(), page_len, "文章列表翻页");
            if !has_more(&page) {
                break;
            }
        }

        let mut stubs: Vec<(String, String, usize)> = Vec::new();
        for (idx, entry) in entries.iter().enumerate() {
            let Some(map) = entry.as_object() else {
                continue;
            };
            let Some(id) = pick_string(map, &["id", "article_id", "aid"]) else {
                continue;
            };
            if let Some(want) = article_id {
                if id != want.to_string() {
                    continue;
                }
            }
            let chapter_title = pick_string(map, &["title", "name"]).unwrap_or_else(|| id.clone());
            stubs.push((id, chapter_title, idx + 1));
        }
        if stubs.is_empty() {
            return Err(DownloadError::Fetch(match article_id {
                Some(aid) => format!("课程中没有文章 {aid}"),
                None => "课程目录为空".to_string(),
            }));
        }

        let raws = self.fetch_chapter_payloads(stubs, include_comments)?;
        Ok(assemble(&title, &course_id.to_string(), raws))
    }

    /// 工作池并发抓取每章正文/音频（以及留言）。
    fn fetch_chapter_payloads(
        &self,
        stubs: Vec<(String, String, usize)>,
        include_comments: bool,
    ) -> Result<Vec<RawChapter>, DownloadError> {
        let bar = self.fetch_bar(stubs.len());
        let results = run_pool(self.cfg.max_workers, &self.cancel, stubs, |_, stub| {
            let out = self.fetch_one_chapter(stub, include_comments);
            bar.inc(1);
            out
        });
        bar.finish_and_clear();
        self.check_cancel()?;

        let mut raws = Vec::with_capacity(results.len());
        for slot in results {
            let Some(result) = slot else {
                return Err(DownloadError::Canceled);
            };
            match result {
                Ok(raw) => raws.push(raw),
                // 确定性错误整个任务失败；抓取失败的单章留给组装阶段丢弃计数
                Err(e @ (DownloadError::Unauthorized | DownloadError::NotPurchased(_))) => {
                    return Err(e);
                }
                Err(e) => {
                    error!(target: "download", error = %e, "章节抓取失败");
                    raws.push(RawChapter::default());
                }
            }
        }
        Ok(raws)
    }

    fn fetch_one_chapter(
        &self,
        (id, title, ordinal): (String, String, usize),
        include_comments: bool,
    ) -> Result<RawChapter, DownloadError> {
        let detail = self.net.article_detail(&id)?;
        let maps = collect_maps(&detail);
        let text = maps
            .iter()
            .find_map(|m| pick_string(m, &["content", "article_content", "body"]));
        let audio_url = maps
            .iter()
            .find_map(|m| pick_string(m, &["mp3_play_url", "audio_url", "play_url"]));

        let comments = if include_comments {
            self.fetch_comments(&id)?
        } else {
            Vec::new()
        };

        Ok(RawChapter {
            id,
            title,
            ordinal,
            audio_url,
            text,
            comments,
        })
    }

    /// 热门留言翻页，受 comments_per_chapter 上限约束。
    fn fetch_comments(&self, article_id: &str) -> Result<Vec<Value>, DownloadError> {
        let cap = self.cfg.comments_per_chapter;
        if cap == 0 {
            return Ok(Vec::new());
        }
        let page_size = cap.min(20).max(1);
        let mut out = Vec::new();
        let mut page = 1usize;
        loop {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(DownloadError::Canceled);
            }
            let resp = self.net.article_comments(article_id, page, page_size)?;
            let list = extract_list(&resp, &["list", "comment_list", "notes"]);
            if list.is_empty() {
                break;
            }
            out.extend(list);
            if out.len() >= cap || !has_more(&resp) {
                break;
            }
            page += 1;
        }
        out.truncate(cap);
        Ok(out)
    }

    // ── 每天听本书 ──────────────────────────────────────────────

    fn fetch_odob(&self, content: &ContentRef) -> Result<(ContentTree, usize), DownloadError> {
        let &ContentId::Num(audio_id) = &content.id else {
            return Err(DownloadError::InvalidIdentifier("听书ID错误".to_string()));
        };

        let detail = self.net.odob_detail(audio_id)?;
        let maps = collect_maps(&detail);
        let title = maps
            .iter()
            .find_map(|m| pick_string(m, &["title", "audio_name", "name"]))
            .unwrap_or_else(|| audio_id.to_string());
        let audio_url = maps
            .iter()
            .find_map(|m| pick_string(m, &["mp3_play_url", "audio_url", "play_url"]));
        let text = maps
            .iter()
            .find_map(|m| pick_string(m, &["manuscript", "content", "article_content"]));
        info!(target: "download", audio_id, %title, "获取听书详情");

        let raw = RawChapter {
            id: audio_id.to_string(),
            title: title.clone(),
            ordinal: 1,
            audio_url,
            text,
            comments: Vec::new(),
        };
        Ok(assemble(&title, &audio_id.to_string(), vec![raw]))
    }

    // ── 电子书 ──────────────────────────────────────────────────

    fn fetch_ebook(&self, content: &ContentRef) -> Result<(ContentTree, usize), DownloadError> {
        let detail = self.net.ebook_detail(content)?;
        let maps = collect_maps(&detail);
        let title = maps
            .iter()
            .find_map(|m| pick_string(m, &["operating_title", "title", "name"]))
            .unwrap_or_else(|| content.id.to_string());
        let enid = maps
            .iter()
            .find_map(|m| pick_string(m, &["enid", "book_enid"]))
            .unwrap_or_else(|| content.id.to_string());
        info!(target: "download", %enid, %title, "获取电子书目录");

        let catalog = extract_list(&detail, &["catalog_list", "catalog", "chapter_list"]);
        if catalog.is_empty() {
            return Err(DownloadError::Fetch("电子书目录为空".to_string()));
        }

        let mut stubs: Vec<(String, String, usize)> = Vec::new();
        for (idx, entry) in catalog.iter().enumerate() {
            let Some(map) = entry.as_object() else {
                continue;
            };
            let Some(id) = pick_string(map, &["chapter_id", "id"]) else {
                continue;
            };
            let chapter_title = pick_string(map, &["text", "title", "name"]).unwrap_or_else(|| id.clone());
            stubs.push((id, chapter_title, idx + 1));
        }

        let bar = self.fetch_bar(stubs.len());
        let enid_ref = &enid;
        let results = run_pool(self.cfg.max_workers, &self.cancel, stubs, |_, stub| {
            let out = self.fetch_ebook_chapter(enid_ref, stub);
            bar.inc(1);
            out
        });
        bar.finish_and_clear();
        self.check_cancel()?;

        let mut raws = Vec::with_capacity(results.len());
        for slot in results {
            let Some(result) = slot else {
                return Err(DownloadError::Canceled);
            };
            match result {
                Ok(raw) => raws.push(raw),
                Err(e @ (DownloadError::Unauthorized | DownloadError::NotPurchased(_))) => {
                    return Err(e);
                }
                Err(e) => {
                    error!(target: "download", error = %e, "电子书章节抓取失败");
                    raws.push(RawChapter::default());
                }
            }
        }
        Ok(assemble(&title, &enid, raws))
    }

    fn fetch_ebook_chapter(
        &self,
        enid: &str,
        (id, title, ordinal): (String, String, usize),
    ) -> Result<RawChapter, DownloadError> {
        let chapter = self.net.ebook_chapter(enid, &id)?;
        let maps = collect_maps(&chapter);
        let text = maps
            .iter()
            .find_map(|m| pick_string(m, &["content", "html", "text"]))
            .or_else(|| {
                // 有的章节按 pages 数组分块返回
                let pages = extract_list(&chapter, &["pages", "page_list"]);
                let joined: String = pages
                    .iter()
                    .filter_map(|p| {
                        p.as_str().map(|s| s.to_string()).or_else(|| {
                            p.as_object()
                                .and_then(|m| pick_string(m, &["content", "html"]))
                        })
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                (!joined.trim().is_empty()).then_some(joined)
            });

        Ok(RawChapter {
            id,
            title,
            ordinal,
            audio_url: None,
            text,
            comments: Vec::new(),
        })
    }

    // ── 电子书笔记 ──────────────────────────────────────────────

    /// 笔记是独立于正文的抓取载荷：只取用户的划线与想法。
    pub(crate) fn fetch_notes_tree(
        &self,
        content: &ContentRef,
    ) -> Result<ContentTree, DownloadError> {
        let detail = self.net.ebook_detail(content)?;
        let maps = collect_maps(&detail);
        let title = maps
            .iter()
            .find_map(|m| pick_string(m, &["operating_title", "title", "name"]))
            .unwrap_or_else(|| content.id.to_string());
        let enid = maps
            .iter()
            .find_map(|m| pick_string(m, &["enid", "book_enid"]))
            .unwrap_or_else(|| content.id.to_string());

        let mut notes: Vec<Value> = Vec::new();
        let mut page = 1usize;
        loop {
            self.check_cancel()?;
            let resp = self.net.ebook_notes(&enid, page)?;
            let list = extract_list(&resp, &["list", "note_list", "notes"]);
            if list.is_empty() {
                break;
            }
            notes.extend(list);
            if !has_more(&resp) {
                break;
            }
            page += 1;
        }
        if notes.is_empty() {
            return Err(DownloadError::Fetch(format!("《{title}》没有划线或笔记")));
        }
        info!(target: "download", %enid, count = notes.len(), "获取划线笔记");

        let mut body = String::new();
        for note in &notes {
            let Some(map) = note.as_object() else {
                continue;
            };
            if let Some(line) = pick_string(map, &["note_line", "line", "quote", "origin_text"]) {
                body.push_str(&format!("<blockquote>{line}</blockquote>\n"));
            }
            if let Some(idea) = pick_string(map, &["note", "content", "idea"]) {
                body.push_str(&format!("<p>{idea}</p>\n"));
            }
        }

        Ok(ContentTree {
            title: title.clone(),
            root_id: enid.clone(),
            chapters: vec![super::models::Chapter {
                id: enid,
                title,
                ordinal: 1,
                audio_url: None,
                text: Some(body),
                comments: Vec::new(),
            }],
        })
    }

    // ── 批量电子书 ──────────────────────────────────────────────

    /// 书架翻页，返回全部已购电子书的引用与书名。
    pub(crate) fn list_all_ebooks(&self) -> Result<Vec<(ContentRef, String)>, DownloadError> {
        let mut out = Vec::new();
        let mut page = 1usize;
        loop {
            self.check_cancel()?;
            let resp = self.net.ebook_shelf(page)?;
            let list = extract_list(&resp, &["book_list", "list", "books"]);
            if list.is_empty() {
                break;
            }
            for entry in &list {
                let Some(map) = entry.as_object() else {
                    continue;
                };
                let title = pick_string(map, &["operating_title", "title", "name"])
                    .unwrap_or_else(|| "未命名".to_string());
                let id = if let Some(enid) = pick_string(map, &["enid", "book_enid"]) {
                    ContentId::Enid(enid)
                } else if let Some(n) = pick_u64(map, &["id", "book_id"]) {
                    ContentId::Num(n)
                } else {
                    continue;
                };
                out.push((
                    ContentRef {
                        kind: Kind::Ebook,
                        id,
                    },
                    title,
                ));
            }
            if !has_more(&resp) {
                break;
            }
            page += 1;
        }
        Ok(out)
    }

    fn fetch_bar(&self, total: usize) -> ProgressBar {
        if total <= 1 {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
        if let Ok(style) =
            ProgressStyle::with_template("{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len}")
        {
            bar.set_style(style.progress_chars("##-"));
        }
        bar.set_prefix("章节下载");
        bar
    }

    fn check_cancel(&self) -> Result<(), DownloadError> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(DownloadError::Canceled);
        }
        Ok(())
    }
}

/// 把响应对象本体和常见嵌套层（class_info/book_info/audio 等）都列为查找源。
pub(crate) fn collect_maps(raw: &Value) -> Vec<&serde_json::Map<String, Value>> {
    let mut maps = Vec::new();
    if let Some(map) = raw.as_object() {
        maps.push(map);
        for key in ["class_info", "book_info", "audio", "article", "data", "detail"] {
            if let Some(inner) = map.get(key).and_then(Value::as_object) {
                maps.push(inner);
            }
        }
    }
    maps
}
