//! Dedao Downloader（得到课程/听书/电子书下载器）。
//!
//! 本 crate 负责：配置加载、命令行入口、内容抓取与导出（mp3/PDF/markdown/epub/html）。
//!
//! 代码结构（读代码入口）：
//! - `base_system`     — 配置/日志/重试等基础设施
//! - `download`        — 下载流水线（解析、抓取、组装、变换、分发）
//! - `network_parser`  — 平台 HTTP 客户端
//! - `book_parser`     — 渲染与写盘（markdown/epub/html/pdf/音频）

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::info;

mod base_system;
mod book_parser;
mod download;
mod network_parser;

use base_system::config::load_or_create;
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use download::models::{DownloadJob, JobOptions};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "dedao-downloader")]
#[command(about = "下载已购买的得到课程、听书与电子书", version = VERSION)]
struct Cli {
    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 数据目录路径（存放 config.yml 和 logs，方便 Docker 挂载）
    #[arg(long)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// 下载已购课程，并转换成 mp3 / PDF / markdown
    #[command(
        long_about = "下载已购课程\n-t 指定下载格式, 1:mp3, 2:PDF文档, 3:markdown文档, 默认 mp3\n-m 是否合并课程文稿(仅文字格式)\n-c 是否下载课程热门留言\n-o 文件名是否加序号前缀, 如 001."
    )]
    Dl {
        /// 课程ID
        course_id: String,
        /// 文章ID（可选，只下载单篇）
        article_id: Option<String>,
        /// 下载格式, 1:mp3, 2:PDF文档, 3:markdown文档
        #[arg(short = 't', long = "downloadType", default_value_t = 1)]
        download_type: u8,
        /// 是否合并课程章节
        #[arg(short, long, default_value_t = false)]
        merge: bool,
        /// 是否下载课程热门留言
        #[arg(short, long, default_value_t = false)]
        comment: bool,
        /// 是否按顺序命名, 文件名前缀加序号, 如 001.
        #[arg(short, long, default_value_t = false)]
        order: bool,
    },

    /// 下载每天听本书音频与文稿
    #[command(long_about = "下载每天听本书\n-t 指定下载格式, 1:mp3, 2:PDF文档, 3:markdown文档, 默认 mp3")]
    Dlo {
        /// 听书ID
        book_id: String,
        /// 下载格式, 1:mp3, 2:PDF文档, 3:markdown文档
        #[arg(short = 't', long = "downloadType", default_value_t = 1)]
        download_type: u8,
    },

    /// 下载电子书
    #[command(
        long_about = "下载电子书\n-t 指定下载格式, 1:html, 2:PDF文档, 3:epub, 4:markdown笔记, 默认 html\n-a 下载所有已购电子书"
    )]
    Dle {
        /// 电子书ID或enid（纯数字的enid用 enid: 前缀）
        id: Option<String>,
        /// 下载格式, 1:html, 2:PDF文档, 3:epub, 4:markdown笔记
        #[arg(short = 't', long = "downloadType", default_value_t = 1)]
        download_type: u8,
        /// 下载所有已购电子书
        #[arg(short, long, default_value_t = false)]
        all: bool,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("错误: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.as_ref().map(std::path::Path::new);
    let _log = LogSystem::init(
        LogOptions {
            debug: cli.debug,
            ..LogOptions::default()
        },
        data_dir,
    )
    .map_err(|e| anyhow!(e.to_string()))?;

    let config: Config = load_or_create(data_dir).map_err(|e| anyhow!(e.to_string()))?;
    if !config.has_session() {
        return Err(anyhow!(
            "未配置登录 Cookie：请登录网页版后从浏览器复制 Cookie 填入 config.yml"
        ));
    }

    let job = build_job(&cli.command)?;
    info!(target: "startup", "dedao-downloader v{}", VERSION);

    let report = download::download(&job, &config)?;
    println!(
        "完成《{}》：共 {} 个文件{}",
        report.title,
        report.written,
        if report.dropped_chapters > 0 || !report.render_failures.is_empty() {
            format!(
                "（跳过 {} 章, 失败 {} 章）",
                report.dropped_chapters,
                report.render_failures.len()
            )
        } else {
            String::new()
        }
    );
    Ok(())
}

fn build_job(command: &Commands) -> Result<DownloadJob, download::error::DownloadError> {
    match command {
        Commands::Dl {
            course_id,
            article_id,
            download_type,
            merge,
            comment,
            order,
        } => DownloadJob::course(
            course_id,
            article_id.as_deref(),
            *download_type,
            JobOptions {
                merge: *merge,
                include_comments: *comment,
                ordered: *order,
            },
        ),
        Commands::Dlo {
            book_id,
            download_type,
        } => DownloadJob::odob(book_id, *download_type),
        Commands::Dle {
            id,
            download_type,
            all,
        } => DownloadJob::ebook(id.as_deref(), *download_type, *all),
    }
}
