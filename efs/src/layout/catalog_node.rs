use crate::PAGE_SIZE;
use crate::page_cache::OnDisk;

/// 目录表节点的首页。
///
/// 节点占据连续的 1 + [`CATALOG_CAPACITY`](crate::CATALOG_CAPACITY) 页，
/// 首页之后的每一页都是一个描述符槽。
#[repr(C)]
pub struct CatalogNode {
    /// 下一个节点所在页，0 表示链表结束
    pub next: u64,
    /// 已占用的槽数
    pub len: u64,
    _reserved: [u8; PAGE_SIZE - 16],
}

unsafe impl OnDisk for CatalogNode {}

impl CatalogNode {
    #[inline]
    pub fn init(&mut self, next: u64) {
        self.next = next;
        self.len = 0;
    }
}
