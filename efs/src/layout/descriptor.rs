//! 文件描述符
//!
//! 每个描述符独占一页，存放文件的元信息以及按文件内偏移排序的片段数组。
//! 片段数组中被占用的项总是连续地排在前面，第一个大小为0的项即为结尾。

use alloc::string::String;
use alloc::vec::Vec;

use enumflags2::{BitFlags, bitflags};

use super::{Name, encode_name, name_bytes, name_to_string};
use crate::page_cache::{OnDisk, PageId};
use crate::{FRAGMENT_CAPACITY, NAME_CAP, PAGE_SIZE, Result};

#[repr(C)]
pub struct FileDescriptor {
    /// 描述符自身所在页
    pub location: u64,
    /// 非0且唯一
    pub id: u64,
    /// 见[`DescriptorFlag`]，高53位保留
    flags: u64,
    /// 父目录ID，0 表示位于根目录
    pub parent: u64,
    /// 文件大小（字节），目录恒为0
    pub size: u64,
    /// 0 表示未知
    pub accessed: u64,
    pub modified: u64,
    pub owner: u64,
    pub group: u64,
    _reserved: [u8; 1024 - 72],
    name: Name,
    fragments: [Fragment; FRAGMENT_CAPACITY],
}

unsafe impl OnDisk for FileDescriptor {}

/// 一段连续的页，承载文件的一部分数据
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Fragment {
    /// 起始页
    pub location: u64,
    /// 页数
    pub size: u64,
}

unsafe impl OnDisk for Fragment {}

/// 描述符标志字的低11位，与磁盘上的位域一一对应
#[bitflags]
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorFlag {
    /// 普通文件；对符号链接而言描述的是链接目标
    File = 1 << 0,
    Link = 1 << 1,
    OwnerRead = 1 << 2,
    OwnerWrite = 1 << 3,
    OwnerExecute = 1 << 4,
    GroupRead = 1 << 5,
    GroupWrite = 1 << 6,
    GroupExecute = 1 << 7,
    OthersRead = 1 << 8,
    OthersWrite = 1 << 9,
    OthersExecute = 1 << 10,
}

/// 权限位，只存储与返回，不做检查
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    OwnerRead = 1 << 0,
    OwnerWrite = 1 << 1,
    OwnerExecute = 1 << 2,
    GroupRead = 1 << 3,
    GroupWrite = 1 << 4,
    GroupExecute = 1 << 5,
    OthersRead = 1 << 6,
    OthersWrite = 1 << 7,
    OthersExecute = 1 << 8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    File,
    Directory,
    Symlink,
}

/// 描述符在内存中的副本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub id: u64,
    pub parent: u64,
    pub kind: DescriptorKind,
    pub permissions: BitFlags<Permission>,
    pub size: u64,
    /// 已分配的页数
    pub pages: u64,
    pub accessed: u64,
    pub modified: u64,
    pub owner: u64,
    pub group: u64,
    pub name: String,
    /// 描述符所在页
    pub location: PageId,
    pub fragments: Vec<Fragment>,
}

impl Permission {
    /// 权限位在标志字中的偏移
    const SHIFT: u32 = 2;

    /// 由 Unix 风格的权限模式（如`0o755`）转换
    pub fn from_mode(mode: u16) -> BitFlags<Permission> {
        // 模式中 owner 读位最高，这里 owner 读位最低
        let bits = (0..9).fold(0u16, |bits, i| {
            if mode & (1 << (8 - i)) != 0 {
                bits | (1 << i)
            } else {
                bits
            }
        });
        BitFlags::from_bits_truncate(bits)
    }

    pub fn to_mode(perms: BitFlags<Permission>) -> u16 {
        let bits = perms.bits();
        (0..9).fold(0u16, |mode, i| {
            if bits & (1 << i) != 0 {
                mode | (1 << (8 - i))
            } else {
                mode
            }
        })
    }
}

impl Fragment {
    #[inline]
    pub const fn new(location: u64, size: u64) -> Self {
        Self { location, size }
    }

    #[inline]
    pub fn start(&self) -> PageId {
        PageId::from(self.location)
    }

    /// 片段之后的第一页
    #[inline]
    pub fn end(&self) -> u64 {
        self.location + self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl FileDescriptor {
    #[inline]
    pub fn is_free(&self) -> bool {
        self.id == 0
    }

    pub fn flags(&self) -> BitFlags<DescriptorFlag> {
        BitFlags::from_bits_truncate(self.flags)
    }

    pub fn kind(&self) -> DescriptorKind {
        let flags = self.flags();
        if flags.contains(DescriptorFlag::Link) {
            DescriptorKind::Symlink
        } else if flags.contains(DescriptorFlag::File) {
            DescriptorKind::File
        } else {
            DescriptorKind::Directory
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind() == DescriptorKind::Directory
    }

    /// 保留位原样保留
    pub fn set_kind(&mut self, kind: DescriptorKind) {
        let mask = (DescriptorFlag::File | DescriptorFlag::Link).bits();
        let bits: BitFlags<DescriptorFlag> = match kind {
            DescriptorKind::File => DescriptorFlag::File.into(),
            DescriptorKind::Directory => BitFlags::empty(),
            DescriptorKind::Symlink => DescriptorFlag::File | DescriptorFlag::Link,
        };
        self.flags = (self.flags & !mask) | bits.bits();
    }

    pub fn permissions(&self) -> BitFlags<Permission> {
        BitFlags::from_bits_truncate((self.flags >> Permission::SHIFT) as u16)
    }

    pub fn set_permissions(&mut self, perms: BitFlags<Permission>) {
        let mask = (BitFlags::<Permission>::all().bits() as u64) << Permission::SHIFT;
        self.flags = (self.flags & !mask) | ((perms.bits() as u64) << Permission::SHIFT);
    }

    #[inline]
    pub fn name_bytes(&self) -> &[u8] {
        name_bytes(&self.name)
    }

    pub fn name(&self) -> String {
        name_to_string(&self.name)
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.name = encode_name(name)?;
        Ok(())
    }

    /// 已使用的片段
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments[..self.fragment_count()]
    }

    #[inline]
    pub fn fragment_count(&self) -> usize {
        self.fragments
            .iter()
            .position(Fragment::is_empty)
            .unwrap_or(FRAGMENT_CAPACITY)
    }

    #[inline]
    pub(crate) fn fragments_mut(&mut self) -> &mut [Fragment; FRAGMENT_CAPACITY] {
        &mut self.fragments
    }

    /// 片段数组覆盖的总页数
    pub fn allocated_pages(&self) -> u64 {
        self.fragments().iter().map(|frag| frag.size).sum()
    }

    /// 容纳`size`字节需要的页数
    #[inline]
    pub fn pages_for(size: u64) -> u64 {
        size.div_ceil(PAGE_SIZE as u64)
    }

    pub fn stat(&self) -> Stat {
        Stat {
            id: self.id,
            parent: self.parent,
            kind: self.kind(),
            permissions: self.permissions(),
            size: self.size,
            pages: self.allocated_pages(),
            accessed: self.accessed,
            modified: self.modified,
            owner: self.owner,
            group: self.group,
            name: self.name(),
            location: PageId::from(self.location),
            fragments: self.fragments().to_vec(),
        }
    }
}

const _: () = assert!(NAME_CAP + 1024 + FRAGMENT_CAPACITY * 16 == PAGE_SIZE);
