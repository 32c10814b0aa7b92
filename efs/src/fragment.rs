//! # 文件片段管理
//!
//! 一个文件的数据由至多 [`FRAGMENT_CAPACITY`] 个片段承载，
//! 片段按其在文件内的偏移排序，只在尾部追加或截断。
//!
//! 新分配的页若紧接在最后一个片段之后，则直接并入该片段。

use crate::free_list::FreeList;
use crate::layout::{FileDescriptor, Fragment};
use crate::page_cache::{PageCache, PageId};
use crate::{Error, FRAGMENT_CAPACITY, PAGE_SIZE, Result};

/// 为文件追加足以容纳`additional_bytes`字节的页。
///
/// 新页连续，返回其起始页号；无需新页时返回`None`。
pub fn grow(
    fd: &mut FileDescriptor,
    additional_bytes: u64,
    free_list: &mut FreeList,
    cache: &PageCache,
) -> Result<Option<PageId>> {
    match additional_bytes.div_ceil(PAGE_SIZE as u64) {
        0 => Ok(None),
        pages => grow_pages(fd, pages, free_list, cache).map(Some),
    }
}

/// 为文件追加`pages`（非0）个连续的页，返回新页的起始页号。
fn grow_pages(
    fd: &mut FileDescriptor,
    pages: u64,
    free_list: &mut FreeList,
    cache: &PageCache,
) -> Result<PageId> {
    let count = fd.fragment_count();
    let start = free_list.allocate(cache, pages)?;
    let id = fd.id;
    let fragments = fd.fragments_mut();

    if count > 0 && fragments[count - 1].end() == u64::from(start) {
        fragments[count - 1].size += pages;
    } else if count == FRAGMENT_CAPACITY {
        // 无法合并又没有空位，归还刚分配的页
        free_list.free(cache, start, pages)?;
        log::warn!("file {id} reached the fragment limit");
        return Err(Error::FragmentLimitExceeded);
    } else {
        fragments[count] = Fragment::new(u64::from(start), pages);
    }

    log::trace!(
        "file {} grows by {pages} pages at {start}, {} fragments",
        fd.id,
        fd.fragment_count()
    );
    Ok(start)
}

/// 从尾部释放`removed_bytes`字节所完整覆盖的页。
///
/// `removed_bytes`超出已分配的字节数时失败。
pub fn shrink(
    fd: &mut FileDescriptor,
    removed_bytes: u64,
    free_list: &mut FreeList,
    cache: &PageCache,
) -> Result<()> {
    if removed_bytes > fd.allocated_pages().saturating_mul(PAGE_SIZE as u64) {
        log::error!(
            "file {} cannot shrink by {removed_bytes} bytes, only {} pages allocated",
            fd.id,
            fd.allocated_pages()
        );
        return Err(Error::OffsetOutOfRange);
    }
    shrink_pages(fd, removed_bytes / PAGE_SIZE as u64, free_list, cache)
}

/// 从尾部释放`pages`个页：先整块释放片段，再截断最后涉及的片段。
pub fn shrink_pages(
    fd: &mut FileDescriptor,
    pages: u64,
    free_list: &mut FreeList,
    cache: &PageCache,
) -> Result<()> {
    if pages > fd.allocated_pages() {
        log::error!(
            "file {} cannot shrink by {pages} pages, only {} allocated",
            fd.id,
            fd.allocated_pages()
        );
        return Err(Error::OffsetOutOfRange);
    }

    let mut count = fd.fragment_count();
    let mut remaining = pages;
    let fragments = fd.fragments_mut();
    while remaining > 0 {
        let last = &mut fragments[count - 1];
        if remaining >= last.size {
            free_list.free(cache, last.start(), last.size)?;
            remaining -= last.size;
            *last = Fragment::default();
            count -= 1;
        } else {
            last.size -= remaining;
            free_list.free(cache, PageId::from(last.end()), remaining)?;
            remaining = 0;
        }
    }

    Ok(())
}

/// 归还文件的全部片段
pub fn release_all(
    fd: &mut FileDescriptor,
    free_list: &mut FreeList,
    cache: &PageCache,
) -> Result<()> {
    for frag in fd.fragments_mut().iter_mut().filter(|frag| !frag.is_empty()) {
        free_list.free(cache, frag.start(), frag.size)?;
        *frag = Fragment::default();
    }
    Ok(())
}

/// 文件内的字节偏移 → (所在页, 页内偏移)
#[inline]
pub fn offset_to_location(fd: &FileDescriptor, offset: u64) -> Result<(PageId, usize)> {
    locate(fd.fragments(), offset)
}

/// 沿片段数组累加页数，直到偏移落入某个片段
pub fn locate(fragments: &[Fragment], offset: u64) -> Result<(PageId, usize)> {
    let mut page_index = offset / PAGE_SIZE as u64;
    let page_offset = (offset % PAGE_SIZE as u64) as usize;

    for frag in fragments {
        if page_index < frag.size {
            return Ok((frag.start() + page_index, page_offset));
        }
        page_index -= frag.size;
    }

    Err(Error::OffsetOutOfRange)
}
