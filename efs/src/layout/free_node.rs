use crate::PAGE_SIZE;
use crate::page_cache::OnDisk;

/// 空闲区域的首页，记录区域大小（含本页）以及下一个空闲区域的位置
#[repr(C)]
pub struct FreeNode {
    /// 下一个空闲区域所在页，0 表示链表结束
    pub next: u64,
    pub size: u64,
    _reserved: [u8; PAGE_SIZE - 16],
}

unsafe impl OnDisk for FreeNode {}

impl FreeNode {
    #[inline]
    pub fn init(&mut self, next: u64, size: u64) {
        self.next = next;
        self.size = size;
    }
}
