//! 瞬时错误的退避重试策略。
//!
//! 只有被 [`Retryable`] 判定为瞬时的错误才会重试；"未购买/登录失效"一类
//! 确定性错误立即向上返回。

use std::time::Duration;

use tracing::warn;

use super::context::Config;

/// 错误的可重试分类：瞬时（超时、连接失败、5xx）为 true。
pub trait Retryable {
    fn retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl BackoffPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_retries: cfg.max_retries,
            min_wait: Duration::from_millis(cfg.min_wait_time.max(50)),
            max_wait: Duration::from_millis(cfg.max_wait_time.max(cfg.min_wait_time.max(50))),
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_wait: Duration::from_millis(800),
            max_wait: Duration::from_millis(8000),
        }
    }
}

/// 指数退避执行 `op`，等待时间每次翻倍直至上限。
pub fn with_backoff<T, E, F>(policy: &BackoffPolicy, what: &str, mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    let mut delay = policy.min_wait;
    let mut attempt: u32 = 0;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if e.retryable() && attempt < policy.max_retries => {
                attempt += 1;
                warn!(
                    target: "network",
                    "{} 失败（第 {}/{} 次重试，{}ms 后）: {}",
                    what,
                    attempt,
                    policy.max_retries,
                    delay.as_millis(),
                    e
                );
                std::thread::sleep(delay);
                delay = std::cmp::min(delay * 2, policy.max_wait);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                TestError::Transient => write!(f, "transient"),
                TestError::Permanent => write!(f, "permanent"),
            }
        }
    }

    impl Retryable for TestError {
        fn retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn fast_policy(max_retries: u32) -> BackoffPolicy {
        BackoffPolicy {
            max_retries,
            min_wait: Duration::from_millis(1),
            max_wait: Duration::from_millis(4),
        }
    }

    #[test]
    fn retries_transient_then_succeeds() {
        let mut calls = 0;
        let result = with_backoff(&fast_policy(3), "op", || {
            calls += 1;
            if calls < 3 {
                Err(TestError::Transient)
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 3);
    }

    #[test]
    fn permanent_error_is_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = with_backoff(&fast_policy(3), "op", || {
            calls += 1;
            Err(TestError::Permanent)
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn gives_up_after_attempt_cap() {
        let mut calls = 0;
        let result: Result<(), _> = with_backoff(&fast_policy(2), "op", || {
            calls += 1;
            Err(TestError::Transient)
        });
        assert!(result.is_err());
        assert_eq!(calls, 3, "初始调用 + 2 次重试");
    }
}
