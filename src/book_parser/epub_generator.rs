//! EPUB 生成器。

use std::io::{Cursor, Read as _, Write as _};

use epub_builder::{EpubBuilder, EpubContent, EpubVersion, ReferenceType, ZipLibrary};

use crate::download::error::DownloadError;
use crate::download::models::{Chapter, ContentTree};

use super::html_generator::{comments_html, wrap_chapter_html};

/// 用于从 root_id 确定性生成 UUID v5 的命名空间。
/// 这保证同一本书（同 ID）的 dc:identifier 永远不变，阅读器可恢复进度。
const EPUB_UUID_NAMESPACE: uuid::Uuid = uuid::Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x10, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30, 0xc8,
]);

const STYLESHEET: &str = "body { font-family: serif; color:#000; line-height:1.5; }
p { margin:0 0 .8em 0; }
h1 { font-size:1.5em; }
blockquote { color:#555; border-left:3px solid #ccc; margin-left:0; padding-left:1em; }
.comment { border-top:1px dashed #ccc; padding:.4em 0; }
.comment small { color:#888; }";

/// 把整棵内容树打包为一个 EPUB，目录由章节标题按 Ordinal 顺序生成。
pub(crate) fn generate_epub(
    tree: &ContentTree,
    include_comments: bool,
) -> Result<Vec<u8>, DownloadError> {
    let render_err = |e: String| DownloadError::Render {
        chapter: tree.title.clone(),
        reason: e,
    };

    let zip = ZipLibrary::new().map_err(|e| render_err(e.to_string()))?;
    let mut book = EpubBuilder::new(zip).map_err(|e| render_err(e.to_string()))?;

    book.epub_version(EpubVersion::V30);

    let stable_uuid = uuid::Uuid::new_v5(&EPUB_UUID_NAMESPACE, tree.root_id.as_bytes());
    book.set_uuid(stable_uuid);
    book.metadata("title", &tree.title).ok();
    book.metadata("lang", "zh").ok();
    // toc.ncx docTitle 和 nav.xhtml title 显示书名而非默认的 "Table Of Contents"
    book.metadata("toc_name", &tree.title).ok();
    book.metadata("generator", "dedao-downloader").ok();

    book.stylesheet(Cursor::new(STYLESHEET.to_string()))
        .map_err(|e| render_err(e.to_string()))?;

    for chapter in &tree.chapters {
        let file_name = format!("chapter_{:05}.xhtml", chapter.ordinal);
        let html = chapter_xhtml(chapter, include_comments);
        book.add_content(
            EpubContent::new(file_name, Cursor::new(html))
                .title(chapter.title.clone())
                .reftype(ReferenceType::Text),
        )
        .map_err(|e| render_err(e.to_string()))?;
    }

    let mut buffer = Vec::new();
    book.generate(&mut buffer)
        .map_err(|e| render_err(e.to_string()))?;

    // 后处理：把 epub-builder 强制输出的 urn:uuid 替换为原始 ID。
    fixup_epub_identifier(buffer, &tree.root_id, &stable_uuid).map_err(|e| render_err(e))
}

fn chapter_xhtml(chapter: &Chapter, include_comments: bool) -> String {
    let mut body = chapter.text.clone().unwrap_or_default();
    if include_comments && !chapter.comments.is_empty() {
        body.push_str(&comments_html(&chapter.comments));
    }
    if body.trim().is_empty() {
        body = "<p>本章内容未能下载（可能是网络错误或内容为空）。</p>".to_string();
    }
    wrap_chapter_html(&chapter.title, &body)
}

/// 在 content.opf 与 toc.ncx 中把 `urn:uuid:xxx` 替换为原始 ID。
fn fixup_epub_identifier(
    epub_bytes: Vec<u8>,
    root_id: &str,
    stable_uuid: &uuid::Uuid,
) -> Result<Vec<u8>, String> {
    let urn_str = format!("urn:uuid:{}", stable_uuid.hyphenated());

    let reader = Cursor::new(epub_bytes);
    let mut archive =
        zip::ZipArchive::new(reader).map_err(|e| format!("failed to read generated epub: {e}"))?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| format!("zip entry read error: {e}"))?;
        let name = entry.name().to_string();
        let compression = entry.compression();
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| format!("zip entry read error: {e}"))?;
        entries.push((name, compression, data));
    }
    drop(archive);

    let mut out = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut out);
        for (name, compression, data) in entries {
            let needs_fixup = name.ends_with("content.opf") || name.ends_with("toc.ncx");
            let options = zip::write::FileOptions::default().compression_method(compression);
            writer
                .start_file(&name, options)
                .map_err(|e| format!("zip write error: {e}"))?;

            if needs_fixup {
                match String::from_utf8(data) {
                    Ok(text) => {
                        let fixed = text.replace(&urn_str, root_id);
                        writer
                            .write_all(fixed.as_bytes())
                            .map_err(|e| format!("zip write error: {e}"))?;
                    }
                    Err(e) => {
                        writer
                            .write_all(&e.into_bytes())
                            .map_err(|e| format!("zip write error: {e}"))?;
                    }
                }
            } else {
                writer
                    .write_all(&data)
                    .map_err(|e| format!("zip write error: {e}"))?;
            }
        }
        writer.finish().map_err(|e| format!("zip finish error: {e}"))?;
    }

    Ok(out.into_inner())
}
