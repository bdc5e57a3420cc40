//! 渲染与输出模块入口。
//!
//! 子模块：
//! - `markdown_generator` — 富文本 → Markdown 与留言区渲染
//! - `epub_generator`     — EPUB 打包与目录生成
//! - `html_generator`     — XHTML 包装与打印页面
//! - `pdf_generator`      — headless Chrome print-to-PDF
//! - `audio_downloader`   — 音频直通下载
//! - `output`             — 产物命名与写盘

pub(crate) mod audio_downloader;
pub(crate) mod epub_generator;
pub(crate) mod html_generator;
pub(crate) mod markdown_generator;
pub(crate) mod output;
pub(crate) mod pdf_generator;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::error;

use crate::base_system::context::Config;
use crate::download::error::DownloadError;
use crate::download::models::{
    ArtifactData, Chapter, ContentTree, JobOptions, OutputFormat, RenderedArtifact,
};
use crate::download::worker_pool::run_pool;

/// 渲染一棵内容树为若干产物（每章一个；EPUB 或合并后为一个）。
///
/// 单章渲染失败只记录并跳过，不影响其余章节；返回 (产物, 失败说明)。
pub(crate) fn render_tree(
    tree: &ContentTree,
    format: OutputFormat,
    opts: &JobOptions,
    cfg: &Config,
    cancel: &Arc<AtomicBool>,
    dest_dir: &std::path::Path,
) -> Result<(Vec<RenderedArtifact>, Vec<String>), DownloadError> {
    match format {
        OutputFormat::Mp3 => render_audio(tree, cfg, cancel, dest_dir),
        OutputFormat::Markdown | OutputFormat::NotesMarkdown => {
            Ok(render_per_chapter(tree, format, |ch| {
                Ok(markdown_generator::chapter_markdown(ch, opts.include_comments).into_bytes())
            }))
        }
        OutputFormat::Html => Ok(render_per_chapter(tree, format, |ch| {
            let mut body = ch.text.clone().unwrap_or_default();
            if opts.include_comments && !ch.comments.is_empty() {
                body.push_str(&html_generator::comments_html(&ch.comments));
            }
            Ok(html_generator::wrap_chapter_html(&ch.title, &body).into_bytes())
        })),
        OutputFormat::Pdf => {
            let renderer = pdf_generator::PdfRenderer::new(&cfg.chrome_path)?;
            Ok(render_per_chapter(tree, format, |ch| {
                let mut body = ch.text.clone().unwrap_or_default();
                if opts.include_comments && !ch.comments.is_empty() {
                    body.push_str(&html_generator::comments_html(&ch.comments));
                }
                let html = html_generator::printable_html(&ch.title, &body);
                renderer.render_html(&ch.title, &html)
            }))
        }
        OutputFormat::Epub => {
            let bytes = epub_generator::generate_epub(tree, opts.include_comments)?;
            let artifact = RenderedArtifact {
                chapter_id: tree.root_id.clone(),
                title: tree.title.clone(),
                ordinal: 1,
                ext: format.ext(),
                mime: format.mime(),
                data: ArtifactData::Bytes(bytes),
            };
            Ok((vec![artifact], Vec::new()))
        }
    }
}

fn render_per_chapter<F>(
    tree: &ContentTree,
    format: OutputFormat,
    render: F,
) -> (Vec<RenderedArtifact>, Vec<String>)
where
    F: Fn(&Chapter) -> Result<Vec<u8>, DownloadError>,
{
    let mut artifacts = Vec::with_capacity(tree.chapters.len());
    let mut failures = Vec::new();
    for chapter in &tree.chapters {
        match render(chapter) {
            Ok(bytes) => artifacts.push(RenderedArtifact {
                chapter_id: chapter.id.clone(),
                title: chapter.title.clone(),
                ordinal: chapter.ordinal,
                ext: format.ext(),
                mime: format.mime(),
                data: ArtifactData::Bytes(bytes),
            }),
            Err(e) => {
                error!(target: "render", chapter = %chapter.title, error = %e, "章节渲染失败");
                failures.push(format!("{}: {}", chapter.title, e));
            }
        }
    }
    (artifacts, failures)
}

/// 音频直通走工作池：各章下载互不依赖。
fn render_audio(
    tree: &ContentTree,
    cfg: &Config,
    cancel: &Arc<AtomicBool>,
    dest_dir: &std::path::Path,
) -> Result<(Vec<RenderedArtifact>, Vec<String>), DownloadError> {
    let client = audio_downloader::audio_client(cfg.request_timeout)?;
    std::fs::create_dir_all(dest_dir).map_err(|source| DownloadError::Write {
        path: dest_dir.to_path_buf(),
        source,
    })?;

    let chapters: Vec<&Chapter> = tree.chapters.iter().collect();
    let results = run_pool(cfg.max_workers, cancel, chapters, |_, ch| {
        let Some(url) = ch.audio_url.as_deref() else {
            return (ch, Err(DownloadError::Render {
                chapter: ch.title.clone(),
                reason: "该章节没有音频".to_string(),
            }));
        };
        let out = audio_downloader::download_audio(&client, &ch.title, url, dest_dir, cancel);
        (ch, out)
    });

    let mut artifacts = Vec::new();
    let mut failures = Vec::new();
    for slot in results {
        let Some((ch, result)) = slot else {
            return Err(DownloadError::Canceled);
        };
        match result {
            Ok(staged) => artifacts.push(RenderedArtifact {
                chapter_id: ch.id.clone(),
                title: ch.title.clone(),
                ordinal: ch.ordinal,
                ext: OutputFormat::Mp3.ext(),
                mime: OutputFormat::Mp3.mime(),
                data: ArtifactData::Staged(staged),
            }),
            Err(DownloadError::Canceled) => return Err(DownloadError::Canceled),
            Err(e) => {
                error!(target: "render", chapter = %ch.title, error = %e, "音频下载失败");
                failures.push(format!("{}: {}", ch.title, e));
            }
        }
    }
    Ok((artifacts, failures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::models::Comment;

    fn text_tree() -> ContentTree {
        ContentTree {
            title: "示例课程".to_string(),
            root_id: "555".to_string(),
            chapters: vec![
                Chapter {
                    id: "1".into(),
                    title: "A".into(),
                    ordinal: 1,
                    audio_url: None,
                    text: Some("<p>一</p>".into()),
                    comments: vec![Comment {
                        author: "甲".into(),
                        body: "赞".into(),
                        like_count: 5,
                    }],
                },
                Chapter {
                    id: "2".into(),
                    title: "B".into(),
                    ordinal: 2,
                    audio_url: None,
                    text: Some("<p>二</p>".into()),
                    comments: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn markdown_yields_one_artifact_per_chapter() {
        let cfg = Config::default();
        let cancel = Arc::new(AtomicBool::new(false));
        let dir = tempfile::tempdir().unwrap();
        let opts = JobOptions {
            include_comments: true,
            ..JobOptions::default()
        };
        let (artifacts, failures) = render_tree(
            &text_tree(),
            OutputFormat::Markdown,
            &opts,
            &cfg,
            &cancel,
            dir.path(),
        )
        .unwrap();
        assert!(failures.is_empty());
        assert_eq!(artifacts.len(), 2);
        let ArtifactData::Bytes(bytes) = &artifacts[0].data else {
            panic!("markdown 应为内存字节");
        };
        let md = String::from_utf8(bytes.clone()).unwrap();
        assert!(md.contains("# A"));
        assert!(md.contains("**甲**（赞 5）：赞"));
    }

    #[test]
    fn epub_yields_single_artifact() {
        let cfg = Config::default();
        let cancel = Arc::new(AtomicBool::new(false));
        let dir = tempfile::tempdir().unwrap();
        let (artifacts, failures) = render_tree(
            &text_tree(),
            OutputFormat::Epub,
            &JobOptions::default(),
            &cfg,
            &cancel,
            dir.path(),
        )
        .unwrap();
        assert!(failures.is_empty());
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].title, "示例课程");
        assert_eq!(artifacts[0].ext, "epub");
    }

    /// `dl 555 -t 3 -m -c` 的形态：3 章各 2 条留言，合并后得到唯一一个
    /// markdown 产物，内含按序的 A/B/C 小节与共 6 条留言。
    #[test]
    fn merged_markdown_course_shape() {
        use crate::download::transform::transform;

        let mut tree = text_tree();
        tree.chapters.push(Chapter {
            id: "3".into(),
            title: "C".into(),
            ordinal: 3,
            audio_url: None,
            text: Some("<p>三</p>".into()),
            comments: Vec::new(),
        });
        for ch in &mut tree.chapters {
            ch.comments = vec![
                Comment {
                    author: format!("{}读者1", ch.title),
                    body: "留言一".into(),
                    like_count: 1,
                },
                Comment {
                    author: format!("{}读者2", ch.title),
                    body: "留言二".into(),
                    like_count: 2,
                },
            ];
        }

        let opts = JobOptions {
            merge: true,
            include_comments: true,
            ordered: false,
        };
        let merged = transform(tree, &opts, OutputFormat::Markdown);

        let cfg = Config::default();
        let cancel = Arc::new(AtomicBool::new(false));
        let dir = tempfile::tempdir().unwrap();
        let (artifacts, failures) = render_tree(
            &merged,
            OutputFormat::Markdown,
            &opts,
            &cfg,
            &cancel,
            dir.path(),
        )
        .unwrap();
        assert!(failures.is_empty());
        assert_eq!(artifacts.len(), 1, "合并后只有一个产物");
        assert_eq!(artifacts[0].title, "示例课程");

        let ArtifactData::Bytes(bytes) = &artifacts[0].data else {
            panic!("markdown 应为内存字节");
        };
        let md = String::from_utf8(bytes.clone()).unwrap();
        let (a, b, c) = (
            md.find("## A").unwrap(),
            md.find("## B").unwrap(),
            md.find("## C").unwrap(),
        );
        assert!(a < b && b < c, "小节按 Ordinal 顺序");
        assert_eq!(md.matches("（赞 ").count(), 6, "留言总数为各章之和");
    }

    /// 往返校验：渲染为 markdown 后重新解析标题，顺序与源树 Ordinal 一致。
    #[test]
    fn markdown_round_trip_preserves_ordinals() {
        let cfg = Config::default();
        let cancel = Arc::new(AtomicBool::new(false));
        let dir = tempfile::tempdir().unwrap();
        let tree = text_tree();
        let (artifacts, _) = render_tree(
            &tree,
            OutputFormat::Markdown,
            &JobOptions::default(),
            &cfg,
            &cancel,
            dir.path(),
        )
        .unwrap();

        let parsed: Vec<(usize, String)> = artifacts
            .iter()
            .map(|a| {
                let ArtifactData::Bytes(bytes) = &a.data else {
                    panic!("markdown 应为内存字节");
                };
                let md = String::from_utf8(bytes.clone()).unwrap();
                let title = md
                    .lines()
                    .find_map(|l| l.strip_prefix("# "))
                    .unwrap()
                    .to_string();
                (a.ordinal, title)
            })
            .collect();

        let source: Vec<(usize, String)> = tree
            .chapters
            .iter()
            .map(|c| (c.ordinal, c.title.clone()))
            .collect();
        assert_eq!(parsed, source);
    }

    #[test]
    fn audio_without_url_is_reported_not_fatal() {
        let cfg = Config::default();
        let cancel = Arc::new(AtomicBool::new(false));
        let dir = tempfile::tempdir().unwrap();
        let (artifacts, failures) = render_tree(
            &text_tree(),
            OutputFormat::Mp3,
            &JobOptions::default(),
            &cfg,
            &cancel,
            dir.path(),
        )
        .unwrap();
        assert!(artifacts.is_empty());
        assert_eq!(failures.len(), 2, "两章都没有音频，逐章记录失败");
    }
}
