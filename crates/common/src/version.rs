//! 行版本号
//!
//! 乐观并发控制使用的单调递增版本号。来源是进程级原子计数器，
//! 不依赖系统时钟，并发写入不会产生相同的版本。

use std::sync::atomic::{AtomicU64, Ordering};

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// 行版本号
///
/// 同一条记录每次成功写入后严格递增，用于检测丢失更新
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From,
)]
#[display("{_0}")]
pub struct RowVersion(pub u64);

impl RowVersion {
    /// 未写入过的记录的初始版本
    pub const fn unset() -> Self {
        Self(0)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl Default for RowVersion {
    fn default() -> Self {
        Self::unset()
    }
}

/// 行版本时钟
///
/// 全局单调的版本来源；`next` 每次返回严格更大的值
#[derive(Debug)]
pub struct RowVersionClock {
    counter: AtomicU64,
}

impl RowVersionClock {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// 下一个版本号，从 1 开始
    pub fn next(&self) -> RowVersion {
        RowVersion(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl Default for RowVersionClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_versions_strictly_increase() {
        let clock = RowVersionClock::new();
        let mut previous = RowVersion::unset();
        for _ in 0..100 {
            let next = clock.next();
            assert!(next > previous);
            previous = next;
        }
        assert_eq!(previous, RowVersion(100));
    }

    #[test]
    fn test_concurrent_versions_are_unique() {
        let clock = Arc::new(RowVersionClock::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let clock = Arc::clone(&clock);
            handles.push(std::thread::spawn(move || {
                (0..250).map(|_| clock.next().value()).collect::<Vec<_>>()
            }));
        }

        let mut seen = std::collections::HashSet::new();
        for handle in handles {
            for version in handle.join().unwrap() {
                assert!(seen.insert(version), "duplicate version {version}");
            }
        }
        assert_eq!(seen.len(), 2000);
    }

    #[test]
    fn test_unset_is_below_first_stamp() {
        let clock = RowVersionClock::new();
        assert!(RowVersion::unset() < clock.next());
    }
}
