use alloc::string::String;

use super::{Name, encode_name, name_to_string};
use crate::page_cache::OnDisk;
use crate::{MAGIC, NAME_CAP, PAGE_SIZE, Result};

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 记录目录表与空闲链表的头节点
#[repr(C)]
pub struct SuperBlock {
    /// 魔数：用于校验文件系统合法性
    magic: [u8; 16],
    pub uuid: [u8; 16],
    /// 目录表首个节点所在页，目录表无序，前面的页也可能存在节点
    pub descriptor_table: u64,
    /// 空闲链表首个节点所在页，空闲链表按位置升序排列
    pub free_space: u64,
    /// 文件系统占据的页数
    pub total_pages: u64,
    _reserved1: [u8; 1024 - 56],
    name: Name,
    _reserved2: [u8; PAGE_SIZE - 1024 - NAME_CAP],
}

unsafe impl OnDisk for SuperBlock {}

impl SuperBlock {
    pub fn init(
        &mut self,
        uuid: [u8; 16],
        descriptor_table: u64,
        free_space: u64,
        total_pages: u64,
        name: &str,
    ) -> Result<()> {
        self.name = encode_name(name)?;
        self.magic = MAGIC;
        self.uuid = uuid;
        self.descriptor_table = descriptor_table;
        self.free_space = free_space;
        self.total_pages = total_pages;
        Ok(())
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    pub fn name(&self) -> String {
        name_to_string(&self.name)
    }
}
