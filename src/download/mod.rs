//! 下载流水线模块入口。
//!
//! 子模块：
//! - `models`      — 数据模型（Kind / ContentRef / DownloadJob / ContentTree 等）
//! - `error`       — 错误分类与可重试判定
//! - `resolver`    — 命令行标识解析
//! - `fetcher`     — 远端抓取（分页、并发、重试）
//! - `assembler`   — 原始记录 → 内容树
//! - `transform`   — 合并与排序变换
//! - `worker_pool` — 章节级并发工作池
//! - `dispatcher`  — 任务分发与批量聚合

pub mod dispatcher;
pub mod error;
pub mod models;
pub mod resolver;

pub(crate) mod assembler;
pub(crate) mod fetcher;
pub(crate) mod transform;
pub(crate) mod worker_pool;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

pub use dispatcher::download;

static CANCEL: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// 全局取消标志：ctrl-c 处理器置位，所有在途抓取/渲染尽快退出。
pub fn cancel_flag() -> Arc<AtomicBool> {
    CANCEL
        .get_or_init(|| Arc::new(AtomicBool::new(false)))
        .clone()
}

pub fn request_cancel() {
    cancel_flag().store(true, Ordering::SeqCst);
}

pub fn cancel_requested() -> bool {
    cancel_flag().load(Ordering::SeqCst)
}
