//! 任务分发：`download(job)` 是流水线的唯一入口。
//!
//! 单件任务按 解析 → 抓取 → 组装 → 变换 → 渲染 → 写盘 走完；批量电子书
//! 先枚举书架，再逐本复用单件流水线，单本失败只记账不中断，最后汇总
//! 成一个聚合结果。

use tracing::{error, info, warn};

use crate::base_system::context::{Config, safe_fs_name};
use crate::book_parser::{output::OutputWriter, render_tree};
use crate::network_parser::network::DedaoNetwork;

use super::error::DownloadError;
use super::fetcher::Fetcher;
use super::models::{
    ContentRef, DownloadJob, JobReport, JobTarget, Kind,
};
use super::transform::{ordinal_width, transform};
use super::{cancel_flag, cancel_requested};

/// 执行一次下载任务。批量任务返回聚合结果或 [`DownloadError::Bulk`]。
pub fn download(job: &DownloadJob, cfg: &Config) -> Result<JobReport, DownloadError> {
    match &job.target {
        JobTarget::One(content) => download_one(content, job, cfg),
        JobTarget::AllEbooks => download_all_ebooks(job, cfg),
    }
}

fn download_one(
    content: &ContentRef,
    job: &DownloadJob,
    cfg: &Config,
) -> Result<JobReport, DownloadError> {
    let cancel = cancel_flag();
    let net = DedaoNetwork::new(cfg)?;
    let fetcher = Fetcher::new(&net, cfg, cancel.clone());

    let (tree, dropped) =
        fetcher.fetch_tree(content, job.options.include_comments, job.article_id)?;
    if tree.chapters.is_empty() {
        return Err(DownloadError::Fetch("没有可下载的章节".to_string()));
    }
    if dropped > 0 {
        warn!(target: "download", dropped, "部分章节无可用内容，已跳过");
    }

    let tree = transform(tree, &job.options, job.format);
    let dest = cfg
        .default_save_dir()
        .join(safe_fs_name(&tree.title, "_", 120));

    let (artifacts, mut failures) =
        render_tree(&tree, job.format, &job.options, cfg, &cancel, &dest)?;

    let width = ordinal_width(tree.chapters.len());
    let mut writer = OutputWriter::new(&dest, job.options.ordered, width)?;
    let mut files = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        if cancel_requested() {
            // 已写出的文件保留，不做回滚
            return Err(DownloadError::Canceled);
        }
        let label = artifact.title.clone();
        match writer.write(artifact) {
            Ok(path) => files.push(path),
            Err(e) => {
                error!(target: "render", error = %e, "产物写盘失败");
                failures.push(format!("{label}: {e}"));
            }
        }
    }

    if files.is_empty() {
        return Err(DownloadError::Fetch(format!(
            "《{}》没有生成任何文件（{} 个章节失败）",
            tree.title,
            failures.len()
        )));
    }

    info!(
        target: "download",
        "《{}》完成: 生成 {} 个文件, 跳过 {} 章, 失败 {} 章",
        tree.title,
        files.len(),
        dropped,
        failures.len()
    );

    Ok(JobReport {
        title: tree.title,
        written: files.len(),
        dropped_chapters: dropped,
        render_failures: failures,
        files,
    })
}

fn download_all_ebooks(job: &DownloadJob, cfg: &Config) -> Result<JobReport, DownloadError> {
    let cancel = cancel_flag();
    let net = DedaoNetwork::new(cfg)?;
    let fetcher = Fetcher::new(&net, cfg, cancel.clone());

    let books = fetcher.list_all_ebooks()?;
    if books.is_empty() {
        return Err(DownloadError::Fetch("书架上没有已购电子书".to_string()));
    }
    info!(target: "download", total = books.len(), "开始批量下载电子书");

    let mut results: Vec<(String, Result<JobReport, DownloadError>)> =
        Vec::with_capacity(books.len());
    for (content, title) in books {
        if cancel_requested() {
            return Err(DownloadError::Canceled);
        }
        let sub_job = DownloadJob {
            kind: Kind::Ebook,
            target: JobTarget::One(content.clone()),
            format: job.format,
            options: job.options,
            article_id: None,
        };
        let result = download_one(&content, &sub_job, cfg);
        if let Err(DownloadError::Canceled) = &result {
            return Err(DownloadError::Canceled);
        }
        if let Err(e) = &result {
            error!(target: "download", book = %title, error = %e, "单本下载失败，继续后续书目");
        }
        results.push((title, result));
    }

    summarize_bulk(results)
}

/// 汇总批量结果：全部成功返回合并报告，否则给出聚合错误（成功数 + 失败清单）。
fn summarize_bulk(
    results: Vec<(String, Result<JobReport, DownloadError>)>,
) -> Result<JobReport, DownloadError> {
    let mut combined = JobReport {
        title: "全部电子书".to_string(),
        ..JobReport::default()
    };
    let mut ok = 0usize;
    let mut failed = Vec::new();

    for (title, result) in results {
        match result {
            Ok(report) => {
                ok += 1;
                combined.written += report.written;
                combined.dropped_chapters += report.dropped_chapters;
                combined.render_failures.extend(report.render_failures);
                combined.files.extend(report.files);
            }
            Err(_) => failed.push(title),
        }
    }

    if failed.is_empty() {
        Ok(combined)
    } else {
        Err(DownloadError::Bulk { ok, failed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(written: usize) -> JobReport {
        JobReport {
            title: "书".to_string(),
            written,
            ..JobReport::default()
        }
    }

    #[test]
    fn bulk_aggregates_failures_without_discarding_successes() {
        let results = vec![
            ("甲书".to_string(), Ok(report(3))),
            (
                "乙书".to_string(),
                Err(DownloadError::NotPurchased("乙书".to_string())),
            ),
            ("丙书".to_string(), Ok(report(2))),
        ];
        let err = summarize_bulk(results).unwrap_err();
        let DownloadError::Bulk { ok, failed } = err else {
            panic!("应得到聚合错误");
        };
        assert_eq!(ok, 2);
        assert_eq!(failed, vec!["乙书".to_string()]);
    }

    #[test]
    fn bulk_all_success_returns_combined_report() {
        let results = vec![
            ("甲书".to_string(), Ok(report(1))),
            ("乙书".to_string(), Ok(report(4))),
        ];
        let combined = summarize_bulk(results).unwrap();
        assert_eq!(combined.written, 5);
    }
}
