//! 章节级并发工作池。
//!
//! 固定数量的工作线程消费一条 crossbeam 队列，结果带索引回收，
//! 调用方按原始顺序取回。取消标志在每个条目开工前检查，保证
//! 中断信号能迅速停住整个池子。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel as channel;

/// 对 `items` 逐个执行 `f`，最多 `workers` 个并发。
///
/// 返回值与输入等长且顺序一致；被取消而未执行的条目为 `None`。
pub(crate) fn run_pool<T, R, F>(
    workers: usize,
    cancel: &Arc<AtomicBool>,
    items: Vec<T>,
    f: F,
) -> Vec<Option<R>>
where
    T: Send,
    R: Send,
    F: Fn(usize, T) -> R + Sync,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let workers = workers.clamp(1, total);
    let (tx, rx) = channel::unbounded::<(usize, T)>();
    let (tx_res, rx_res) = channel::unbounded::<(usize, R)>();

    for pair in items.into_iter().enumerate() {
        let _ = tx.send(pair);
    }
    drop(tx);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let rx = rx.clone();
            let tx_res = tx_res.clone();
            let f = &f;
            scope.spawn(move || {
                for (idx, item) in rx.iter() {
                    if cancel.load(Ordering::Relaxed) {
                        return;
                    }
                    let _ = tx_res.send((idx, f(idx, item)));
                }
            });
        }
        drop(tx_res);
    });

    let mut out: Vec<Option<R>> = (0..total).map(|_| None).collect();
    for (idx, value) in rx_res.iter() {
        out[idx] = Some(value);
    }
    out
}
