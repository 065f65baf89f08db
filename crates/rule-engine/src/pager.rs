//! 分页读取器
//!
//! 以固定页大小按键升序流式读取候选集，限制扫描策略的内存占用。
//! 游标（数据库连接等）在读到末页、显式关闭或读取器被 drop 时释放，
//! 因此评估被取消或中途出错时也不会泄漏连接。

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;

/// 分页游标
///
/// 实现方必须按键升序返回 `after` 之后（不含）的至多 `limit` 行。
#[async_trait]
pub trait PageCursor<R>: Send {
    async fn fetch(&mut self, after: Option<i64>, limit: usize) -> Result<Vec<R>>;
}

/// 一页数据
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 本页行数小于页大小时为 false，这是唯一的结束信号
    pub has_more: bool,
}

/// 键集分页读取器
pub struct FastPager<R> {
    cursor: Option<Box<dyn PageCursor<R>>>,
    page_size: usize,
    last_key: Option<i64>,
    pages_read: usize,
}

impl<R: Send> FastPager<R> {
    /// 创建读取器，页大小至少为 1
    pub fn new(cursor: Box<dyn PageCursor<R>>, page_size: usize) -> Self {
        Self {
            cursor: Some(cursor),
            page_size: page_size.max(1),
            last_key: None,
            pages_read: 0,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn pages_read(&self) -> usize {
        self.pages_read
    }

    /// 是否还有未读取的数据
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    /// 读取下一页
    ///
    /// `projector` 将行投影为调用方需要的形状；`key_selector` 取出行的排序键，
    /// 作为下一页的起点。读到末页后游标立即释放，之后的调用返回空页。
    pub async fn read_next_page<T, P, K>(&mut self, projector: P, key_selector: K) -> Result<Page<T>>
    where
        P: Fn(&R) -> T + Send,
        K: Fn(&R) -> i64 + Send,
    {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(Page {
                items: Vec::new(),
                has_more: false,
            });
        };

        let rows = cursor.fetch(self.last_key, self.page_size).await?;
        self.pages_read += 1;

        if let Some(last) = rows.last() {
            self.last_key = Some(key_selector(last));
        }

        let has_more = rows.len() >= self.page_size;
        if !has_more {
            self.close();
        }

        debug!(
            page = self.pages_read,
            rows = rows.len(),
            has_more,
            "已读取候选集分页"
        );

        Ok(Page {
            items: rows.iter().map(projector).collect(),
            has_more,
        })
    }

    /// 释放游标
    pub fn close(&mut self) {
        self.cursor = None;
    }
}

/// 内存切片上的游标，要求输入已按键升序排列
pub struct VecCursor<R> {
    rows: Vec<R>,
    key: fn(&R) -> i64,
}

impl<R> VecCursor<R> {
    /// 按键排序后构造游标
    pub fn new(mut rows: Vec<R>, key: fn(&R) -> i64) -> Self {
        rows.sort_by_key(key);
        Self { rows, key }
    }
}

#[async_trait]
impl<R: Clone + Send + Sync> PageCursor<R> for VecCursor<R> {
    async fn fetch(&mut self, after: Option<i64>, limit: usize) -> Result<Vec<R>> {
        let start = match after {
            Some(after) => self.rows.partition_point(|r| (self.key)(r) <= after),
            None => 0,
        };
        Ok(self.rows.iter().skip(start).take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: i64,
        value: i64,
    }

    fn rows(n: usize) -> Vec<Row> {
        // 倒序生成，验证读取器按键升序返回
        (0..n as i64)
            .rev()
            .map(|i| Row {
                id: i * 3 + 1,
                value: i,
            })
            .collect()
    }

    async fn read_all(n: usize, page_size: usize) -> (Vec<i64>, usize) {
        let mut pager = FastPager::new(Box::new(VecCursor::new(rows(n), |r: &Row| r.id)), page_size);
        let mut ids = Vec::new();

        loop {
            let page = pager.read_next_page(|r| r.id, |r| r.id).await.unwrap();
            ids.extend(page.items);
            if !page.has_more {
                break;
            }
        }

        (ids, pager.pages_read())
    }

    #[tokio::test]
    async fn test_round_trip_covers_set_once_in_order() {
        let p = 10;
        for n in [0, p - 3, p, 3 * p + 7] {
            let (ids, _) = read_all(n, p).await;
            let expected: Vec<i64> = (0..n as i64).map(|i| i * 3 + 1).collect();
            assert_eq!(ids, expected, "n = {}", n);
        }
    }

    #[tokio::test]
    async fn test_terminal_page_detection() {
        // 行数小于页大小：一页结束
        assert_eq!(read_all(7, 10).await.1, 1);
        // 行数等于页大小：第二页为空页
        assert_eq!(read_all(10, 10).await.1, 2);
        // 3P+7：四页
        assert_eq!(read_all(37, 10).await.1, 4);
        // 空集：一页
        assert_eq!(read_all(0, 10).await.1, 1);
    }

    #[tokio::test]
    async fn test_projection() {
        let mut pager = FastPager::new(Box::new(VecCursor::new(rows(3), |r: &Row| r.id)), 5);
        let page = pager.read_next_page(|r| r.value * 10, |r| r.id).await.unwrap();
        assert_eq!(page.items, vec![0, 10, 20]);
        assert!(!page.has_more);
        assert!(!pager.has_more());

        // 读取完毕后再次读取返回空页
        let page = pager.read_next_page(|r| r.value, |r| r.id).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(pager.pages_read(), 1);
    }

    struct DropFlagCursor {
        dropped: Arc<AtomicBool>,
    }

    impl Drop for DropFlagCursor {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl PageCursor<Row> for DropFlagCursor {
        async fn fetch(&mut self, after: Option<i64>, limit: usize) -> Result<Vec<Row>> {
            let start = after.map(|a| a + 1).unwrap_or(0);
            Ok((start..start + limit as i64)
                .map(|id| Row { id, value: id })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_cursor_released_on_drop_mid_scan() {
        let dropped = Arc::new(AtomicBool::new(false));
        let mut pager = FastPager::new(
            Box::new(DropFlagCursor {
                dropped: dropped.clone(),
            }),
            4,
        );

        let page = pager.read_next_page(|r| r.id, |r| r.id).await.unwrap();
        assert_eq!(page.items, vec![0, 1, 2, 3]);
        assert!(page.has_more);
        assert!(!dropped.load(Ordering::SeqCst));

        drop(pager);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        let pager = FastPager::new(Box::new(VecCursor::new(rows(1), |r: &Row| r.id)), 0);
        assert_eq!(pager.page_size(), 1);
    }
}
