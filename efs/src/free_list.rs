//! # 空闲空间分配器
//!
//! 未分配的页组成若干**空闲区域**，每个区域的首页存放 [`FreeNode`]，
//! 所有区域串成单向链表，满足：
//! - 按区域位置升序排列；
//! - 区域之间既不重叠，也不相邻（相邻的区域总会被合并）。
//!
//! 分配采用首次适应：取第一个足够大的区域，从其前端切下所需的页。

use alloc::vec::Vec;

use crate::layout::FreeNode;
use crate::page_cache::{PageCache, PageId};
use crate::{Error, Result};

#[derive(Debug)]
pub struct FreeList {
    /// 首个空闲区域，0 表示没有空闲空间。与超级块中的记录同步
    head: u64,
    /// 分区总页数，合法的页号位于`[1, total_pages)`
    total_pages: u64,
}

/// 链表上的一个空闲区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub location: u64,
    pub size: u64,
    next: u64,
}

impl Region {
    #[inline]
    pub fn end(&self) -> u64 {
        self.location + self.size
    }
}

impl FreeList {
    pub fn new(head: u64, total_pages: u64) -> Self {
        Self { head, total_pages }
    }

    #[inline]
    pub fn head(&self) -> u64 {
        self.head
    }

    #[inline]
    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    /// 分区扩容后更新边界，新增的页需另行[`free`](Self::free)
    pub fn set_total_pages(&mut self, total_pages: u64) {
        self.total_pages = total_pages;
    }

    /// 分配`n`个连续的页，返回首页页号。
    pub fn allocate(&mut self, cache: &PageCache, n: u64) -> Result<PageId> {
        if n == 0 {
            return Err(Error::InvalidArgument);
        }

        let mut prev: Option<Region> = None;
        let mut cursor = self.head;
        while cursor != 0 {
            let region = self.region(cache, cursor, prev)?;

            if region.size >= n {
                let replacement = if region.size == n {
                    // 恰好用尽，整个区域脱离链表
                    region.next
                } else {
                    // 从前端切下，剩余部分在新位置写上节点
                    let rest = region.location + n;
                    write_node(cache, rest, region.next, region.size - n)?;
                    rest
                };
                self.relink(cache, prev, replacement)?;

                log::trace!(
                    "allocate {n} pages at {} from region ({}, {})",
                    region.location,
                    region.location,
                    region.size
                );
                return Ok(PageId::from(region.location));
            }

            prev = Some(region);
            cursor = region.next;
        }

        log::debug!("no free region holds {n} pages");
        Err(Error::OutOfSpace)
    }

    /// 释放`[at, at + n)`，按位置插入链表并与前后相邻的区域合并。
    pub fn free(&mut self, cache: &PageCache, at: PageId, n: u64) -> Result<()> {
        let at = u64::from(at);
        let end = at.checked_add(n).ok_or(Error::CorruptFreeList)?;
        if n == 0 || at == 0 || end > self.total_pages {
            log::error!("free of invalid range [{at}, {end})");
            return Err(Error::CorruptFreeList);
        }

        // 找到插入位置：prev < at <= next
        let mut prev: Option<Region> = None;
        let mut next: Option<Region> = None;
        let mut cursor = self.head;
        while cursor != 0 {
            let region = self.region(cache, cursor, prev)?;
            if region.location >= at {
                next = Some(region);
                break;
            }
            prev = Some(region);
            cursor = region.next;
        }

        if prev.is_some_and(|prev| prev.end() > at) || next.is_some_and(|next| end > next.location)
        {
            log::error!("free of [{at}, {end}) overlaps a free region");
            return Err(Error::CorruptFreeList);
        }

        let merge_prev = prev.filter(|prev| prev.end() == at);
        let merge_next = next.filter(|next| next.location == end);

        match (merge_prev, merge_next) {
            (Some(prev), Some(next)) => {
                write_node(cache, prev.location, next.next, prev.size + n + next.size)?;
            }
            (Some(prev), None) => {
                write_node(cache, prev.location, prev.next, prev.size + n)?;
            }
            (None, Some(next)) => {
                write_node(cache, at, next.next, n + next.size)?;
                self.relink(cache, prev, at)?;
            }
            (None, None) => {
                write_node(cache, at, next.map_or(0, |next| next.location), n)?;
                self.relink(cache, prev, at)?;
            }
        }

        log::trace!(
            "free [{at}, {end}) merge_prev={} merge_next={}",
            merge_prev.is_some(),
            merge_next.is_some()
        );
        Ok(())
    }

    /// 按链表顺序列出全部空闲区域
    pub fn regions(&self, cache: &PageCache) -> Result<Vec<Region>> {
        let mut regions = Vec::new();
        let mut prev = None;
        let mut cursor = self.head;
        while cursor != 0 {
            let region = self.region(cache, cursor, prev)?;
            regions.push(region);
            prev = Some(region);
            cursor = region.next;
        }
        Ok(regions)
    }

    /// 空闲页总数
    pub fn free_pages(&self, cache: &PageCache) -> Result<u64> {
        Ok(self.regions(cache)?.iter().map(|region| region.size).sum())
    }
}

impl FreeList {
    /// 读取位于`location`的区域，并检查它与前一个区域的关系。
    ///
    /// 位置严格递增保证了遍历一定会结束。
    fn region(&self, cache: &PageCache, location: u64, prev: Option<Region>) -> Result<Region> {
        if location == 0 || location >= self.total_pages {
            log::error!("free region at {location} is out of bounds");
            return Err(Error::CorruptFreeList);
        }
        if prev.is_some_and(|prev| prev.end() >= location) {
            log::error!("free region at {location} is unsorted or adjacent to its predecessor");
            return Err(Error::CorruptFreeList);
        }

        let (next, size) = cache
            .get(PageId::from(location))?
            .lock()
            .map(0, |node: &FreeNode| (node.next, node.size));

        if size == 0 || location.saturating_add(size) > self.total_pages {
            log::error!("free region at {location} has invalid size {size}");
            return Err(Error::CorruptFreeList);
        }

        Ok(Region {
            location,
            size,
            next,
        })
    }

    /// 让`prev`（或链表头）指向`next`
    fn relink(&mut self, cache: &PageCache, prev: Option<Region>, next: u64) -> Result<()> {
        match prev {
            Some(prev) => {
                cache
                    .get(PageId::from(prev.location))?
                    .lock()
                    .map_mut(0, |node: &mut FreeNode| node.next = next);
            }
            None => {
                log::debug!("free list head {} -> {next}", self.head);
                self.head = next;
            }
        }
        Ok(())
    }
}

fn write_node(cache: &PageCache, location: u64, next: u64, size: u64) -> Result<()> {
    cache
        .get_zeroed(PageId::from(location))?
        .lock()
        .map_mut(0, |node: &mut FreeNode| node.init(next, size));
    Ok(())
}
