#![no_std]

extern crate alloc;

/* efs 的整体架构，自上而下 */

// 文件系统句柄：挂载、格式化，以及文件的创建、读写、删除
mod efs;

// 目录表：以展开链表存放的文件描述符
mod catalog;

// 文件片段管理：单个文件的有序片段数组
mod fragment;

// 空闲空间分配器：按位置排序、自动合并的空闲链表
mod free_list;

// 磁盘数据结构层
pub mod layout;

// 页缓存层：内存上的页数据缓存
mod page_cache;

mod error;

pub use page_dev::{IoError, IoErrorKind, PageDevice};

pub use self::{
    catalog::NewEntry,
    efs::{EasyFileSystem, FormatOptions, FsStat},
    error::{Error, Result},
    layout::{DescriptorKind, Fragment, Permission, Stat},
    page_cache::PageId,
};

/// 页大小（字节）
pub const PAGE_SIZE: usize = 4096;
/// 超级块的魔数
pub const MAGIC: [u8; 16] = *b"E- FILESYSTEM SB";
/// 目录表每个节点可容纳的描述符数
pub const CATALOG_CAPACITY: usize = 255;
/// 每个文件最多拥有的片段数
pub const FRAGMENT_CAPACITY: usize = 128;
/// 文件名与文件系统名的存储容量，含结尾的 \0
pub const NAME_CAP: usize = 1024;

/// 根目录的ID，根目录本身不占用描述符
pub const ROOT: u64 = 0;

type DataPage = [u8; PAGE_SIZE];
