use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use efs::{DescriptorKind, EasyFileSystem, FormatOptions, ROOT};

use super::*;

struct TempImage(PathBuf);

impl TempImage {
    fn new(tag: &str, pages: u64) -> (Self, Arc<BlockFile>) {
        let path = std::env::temp_dir().join(format!("efs-{tag}-{}.img", std::process::id()));
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        fd.set_len(pages * PAGE_SIZE as u64).unwrap();
        (Self(path), Arc::new(BlockFile::new(fd)))
    }

    fn reopen(&self) -> Arc<BlockFile> {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.0)
            .unwrap();
        Arc::new(BlockFile::new(fd))
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

#[test]
fn page_io() {
    let (_image, dev) = TempImage::new("page-io", 4);
    assert_eq!(dev.pages().unwrap(), 4);

    let page = [0x5a; PAGE_SIZE];
    dev.write_page(3, &page).unwrap();
    let mut buf = [0; PAGE_SIZE];
    dev.read_page(3, &mut buf).unwrap();
    assert_eq!(buf, page);

    assert_eq!(
        dev.read_page(4, &mut buf),
        Err(IoError::new(4, IoErrorKind::Read))
    );
    assert_eq!(
        dev.write_page(0, &page[1..]),
        Err(IoError::new(0, IoErrorKind::OutOfBounds))
    );
}

#[test]
fn image_survives_reopen() {
    let (image, dev) = TempImage::new("reopen", 600);
    {
        let efs = EasyFileSystem::format(
            dev,
            FormatOptions {
                pages: 600,
                name: "image".into(),
                uuid: [1; 16],
            },
        )
        .unwrap();
        let mut efs = efs.write();
        let bin = efs.mkdir(ROOT, "bin").unwrap();
        let app = efs.create_file(bin, "app").unwrap();
        efs.write_at(app, 0, &[9; 5000]).unwrap();
    }

    let efs = EasyFileSystem::mount(image.reopen()).unwrap();
    let efs = efs.read();
    assert_eq!(efs.name(), "image");
    assert_eq!(efs.uuid(), [1; 16]);

    let bin = efs.lookup(ROOT, "bin").unwrap();
    assert_eq!(bin.kind, DescriptorKind::Directory);
    let app = efs.lookup(bin.id, "app").unwrap();
    assert_eq!(app.size, 5000);

    let mut buf = vec![0; 6000];
    assert_eq!(efs.read_at(app.id, 0, &mut buf).unwrap(), 5000);
    assert!(buf[..5000].iter().all(|&b| b == 9));
}
