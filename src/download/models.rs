//! 下载相关的数据模型定义。
//!
//! 包含内容种类、内容引用、输出格式、下载任务、内容树与产物等核心数据结构。
//! 种类与格式都是封闭枚举：平台的内容形态在编译期即已确定。

use std::path::PathBuf;

use serde::Serialize;

use super::error::DownloadError;
use super::resolver;

/// 内容种类：课程、每天听本书、电子书、电子书笔记。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Course,
    Odob,
    Ebook,
    EbookNotes,
}

impl Kind {
    /// 该种类是否允许用非数字的对外 ID（enid）寻址。
    pub fn allows_enid(self) -> bool {
        matches!(self, Kind::Ebook | Kind::EbookNotes)
    }
}

/// 已解析的内容标识：平台数字 ID 或对外 enid，二者必居其一。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentId {
    Num(u64),
    Enid(String),
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentId::Num(n) => write!(f, "{n}"),
            ContentId::Enid(s) => write!(f, "{s}"),
        }
    }
}

/// 指向一件已购内容的类型化引用，解析完成后不可变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    pub kind: Kind,
    pub id: ContentId,
}

/// 输出格式。各种类的合法取值见 [`OutputFormat::from_type_flag`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Mp3,
    Pdf,
    Markdown,
    Epub,
    Html,
    NotesMarkdown,
}

impl OutputFormat {
    /// `-t` 数字到格式的映射，按种类区分：
    /// 课程/听书: 1=mp3, 2=PDF, 3=markdown；电子书: 1=html, 2=PDF, 3=epub, 4=markdown笔记。
    pub fn from_type_flag(kind: Kind, t: u8) -> Result<Self, DownloadError> {
        let format = match (kind, t) {
            (Kind::Course | Kind::Odob, 1) => OutputFormat::Mp3,
            (Kind::Course | Kind::Odob, 2) => OutputFormat::Pdf,
            (Kind::Course | Kind::Odob, 3) => OutputFormat::Markdown,
            (Kind::Ebook | Kind::EbookNotes, 1) => OutputFormat::Html,
            (Kind::Ebook | Kind::EbookNotes, 2) => OutputFormat::Pdf,
            (Kind::Ebook | Kind::EbookNotes, 3) => OutputFormat::Epub,
            (Kind::Ebook | Kind::EbookNotes, 4) => OutputFormat::NotesMarkdown,
            _ => {
                return Err(DownloadError::InvalidIdentifier(format!(
                    "下载格式 -t {t} 无效"
                )));
            }
        };
        Ok(format)
    }

    pub fn ext(self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Markdown | OutputFormat::NotesMarkdown => "md",
            OutputFormat::Epub => "epub",
            OutputFormat::Html => "html",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "audio/mpeg",
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Markdown | OutputFormat::NotesMarkdown => "text/markdown",
            OutputFormat::Epub => "application/epub+zip",
            OutputFormat::Html => "text/html",
        }
    }

    /// 是否为文字型格式（合并仅对这些格式有意义）。
    pub fn is_text(self) -> bool {
        !matches!(self, OutputFormat::Mp3)
    }
}

/// 任务选项，按值穿过各流水线阶段，不做全局状态。
#[derive(Debug, Clone, Copy, Default)]
pub struct JobOptions {
    pub merge: bool,
    pub include_comments: bool,
    pub ordered: bool,
}

/// 任务目标：单件内容或"全部已购电子书"，二者必居其一。
#[derive(Debug, Clone)]
pub enum JobTarget {
    One(ContentRef),
    AllEbooks,
}

/// 一次下载任务。由 CLI 构造后交给 [`super::dispatcher::download`]。
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub kind: Kind,
    pub target: JobTarget,
    pub format: OutputFormat,
    pub options: JobOptions,
    /// 课程任务可选地只下载单篇文章。
    pub article_id: Option<u64>,
}

impl DownloadJob {
    pub fn course(
        raw_id: &str,
        raw_article: Option<&str>,
        t: u8,
        options: JobOptions,
    ) -> Result<Self, DownloadError> {
        let format = OutputFormat::from_type_flag(Kind::Course, t)?;
        let content = resolver::resolve(raw_id, Kind::Course)
            .map_err(|_| DownloadError::InvalidIdentifier("课程ID错误".to_string()))?;
        let article_id = match raw_article {
            None => None,
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| DownloadError::InvalidIdentifier("文章ID错误".to_string()))?,
            ),
        };
        Ok(Self {
            kind: Kind::Course,
            target: JobTarget::One(content),
            format,
            options,
            article_id,
        })
    }

    pub fn odob(raw_id: &str, t: u8) -> Result<Self, DownloadError> {
        let format = OutputFormat::from_type_flag(Kind::Odob, t)?;
        let content = resolver::resolve(raw_id, Kind::Odob)
            .map_err(|_| DownloadError::InvalidIdentifier("听书ID错误".to_string()))?;
        Ok(Self {
            kind: Kind::Odob,
            target: JobTarget::One(content),
            format,
            options: JobOptions::default(),
            article_id: None,
        })
    }

    /// `dle`：`all=true` 时跳过解析直接走批量目标；否则必须给出 ID 或 enid。
    pub fn ebook(raw_id: Option<&str>, t: u8, all: bool) -> Result<Self, DownloadError> {
        let kind = if t == 4 { Kind::EbookNotes } else { Kind::Ebook };
        let format = OutputFormat::from_type_flag(kind, t)?;

        if all {
            if raw_id.is_some() {
                return Err(DownloadError::InvalidIdentifier(
                    "-a 下载全部电子书时不能再指定ID".to_string(),
                ));
            }
            return Ok(Self {
                kind: Kind::Ebook,
                target: JobTarget::AllEbooks,
                format,
                options: JobOptions::default(),
                article_id: None,
            });
        }

        let raw = raw_id.ok_or_else(|| {
            DownloadError::InvalidIdentifier(
                "必须提供电子书ID或使用 -a 参数下载所有电子书".to_string(),
            )
        })?;
        let content = resolver::resolve(raw, kind)?;
        Ok(Self {
            kind,
            target: JobTarget::One(content),
            format,
            options: JobOptions::default(),
            article_id: None,
        })
    }
}

/// 一条热门留言，归属于唯一的章节。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub like_count: u64,
}

/// 一个章节：音频地址与正文至少其一；Ordinal 取自服务端顺序，后续不再排序。
#[derive(Debug, Clone)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub ordinal: usize,
    pub audio_url: Option<String>,
    pub text: Option<String>,
    pub comments: Vec<Comment>,
}

/// 一件已购内容的内存树。每个任务新建一棵，渲染完即丢弃。
#[derive(Debug, Clone)]
pub struct ContentTree {
    pub title: String,
    pub root_id: String,
    pub chapters: Vec<Chapter>,
}

/// 渲染产物的数据载体：文字/PDF 在内存里，音频直接落在暂存文件上。
#[derive(Debug)]
pub enum ArtifactData {
    Bytes(Vec<u8>),
    Staged(tempfile::NamedTempFile),
}

/// 渲染器输出、写入器消费的一次性产物。
#[derive(Debug)]
pub struct RenderedArtifact {
    pub chapter_id: String,
    pub title: String,
    pub ordinal: usize,
    pub ext: &'static str,
    pub mime: &'static str,
    pub data: ArtifactData,
}

/// 单个任务完成后的汇总，交给 CLI 输出。
#[derive(Debug, Default, Clone, Serialize)]
pub struct JobReport {
    pub title: String,
    pub written: usize,
    pub dropped_chapters: usize,
    pub render_failures: Vec<String>,
    pub files: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_flag_mapping_per_kind() {
        assert_eq!(
            OutputFormat::from_type_flag(Kind::Course, 1).unwrap(),
            OutputFormat::Mp3
        );
        assert_eq!(
            OutputFormat::from_type_flag(Kind::Course, 3).unwrap(),
            OutputFormat::Markdown
        );
        assert_eq!(
            OutputFormat::from_type_flag(Kind::Ebook, 1).unwrap(),
            OutputFormat::Html
        );
        assert_eq!(
            OutputFormat::from_type_flag(Kind::Ebook, 4).unwrap(),
            OutputFormat::NotesMarkdown
        );
        assert!(OutputFormat::from_type_flag(Kind::Course, 4).is_err());
        assert!(OutputFormat::from_type_flag(Kind::Ebook, 5).is_err());
    }

    #[test]
    fn bulk_target_excludes_concrete_id() {
        let job = DownloadJob::ebook(None, 1, true).unwrap();
        assert!(matches!(job.target, JobTarget::AllEbooks));
        assert!(DownloadJob::ebook(Some("123"), 1, true).is_err());
        assert!(DownloadJob::ebook(None, 1, false).is_err());
    }

    #[test]
    fn course_rejects_non_numeric_ids() {
        assert!(DownloadJob::course("abc", None, 3, JobOptions::default()).is_err());
        assert!(DownloadJob::course("555", Some("xyz"), 3, JobOptions::default()).is_err());
        let job = DownloadJob::course("555", Some("42"), 3, JobOptions::default()).unwrap();
        assert_eq!(job.article_id, Some(42));
    }

    #[test]
    fn notes_flag_switches_kind() {
        let job = DownloadJob::ebook(Some("abcDEF"), 4, false).unwrap();
        assert_eq!(job.kind, Kind::EbookNotes);
        assert_eq!(job.format, OutputFormat::NotesMarkdown);
    }
}
