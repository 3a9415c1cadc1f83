use pfs::{Config, DirScan, Disk, Error, RamDisk, ScanWindow, SectorId, SECTOR_SIZE};

const SECTORS: u64 = 1_000_000;

fn formatted() -> Disk<RamDisk> {
    let mut disk = Disk::new(RamDisk::new(SECTORS));
    disk.format(SECTORS, "__mbr").unwrap();
    disk
}

#[test]
fn format_write_extract() {
    let mut disk = formatted();

    let partitions = disk.partitions().unwrap();
    assert_eq!(1, partitions.len());
    let part = &partitions[0];
    assert_eq!("__mbr", part.name);
    assert_eq!(1, part.start_sector);
    assert_eq!(SECTORS - 101, part.sector_count);

    let data: Vec<u8> = (0..1300u32).map(|i| (i * 7 % 251) as u8).collect();
    let used_before = disk.device_mut().used_blocks();
    let ino = disk.write_file(0, &data, "SLUS_123.45.iso").unwrap();

    let files = disk.list_directory(part).unwrap();
    assert_eq!(1, files.len());
    let file = &files[0];
    assert_eq!(ino, file.ino);
    assert_eq!("SLUS_123.45.iso", file.name);
    assert_eq!(1300, file.inode.size);
    assert_eq!(3, file.inode.blocks().count());

    // three data sectors and one directory block; the new inode shares the
    // root inode's sector
    assert_eq!(used_before + 4, disk.device_mut().used_blocks());

    let mut out = Vec::new();
    assert_eq!(1300, disk.extract(part, &file.inode, &mut out).unwrap());
    assert_eq!(data, out);
}

#[test]
fn enumeration_is_stable() {
    let mut disk = formatted();
    disk.write_file(0, b"hello", "a.txt").unwrap();

    let first = disk.partitions().unwrap();
    let second = disk.partitions().unwrap();
    assert_eq!(first, second);

    let mut blank = Disk::new(RamDisk::new(SECTORS));
    assert!(blank.partitions().unwrap().is_empty());
    assert!(!blank.has_table().unwrap());
    assert!(matches!(
        blank.write_file(0, b"x", "x"),
        Err(Error::PartitionOutOfRange { index: 0, count: 0 })
    ));
}

#[test]
fn full_window_leaves_device_unchanged() {
    let mut disk = formatted();
    let part = disk.partition(0).unwrap();
    for rel in 10..1010u32 {
        disk.write_sector(part.sector(rel), &[0xFF; SECTOR_SIZE])
            .unwrap();
    }
    let before = disk.device_mut().clone();

    match disk.write_file(0, &[1; 100], "nope") {
        Err(Error::OutOfSpace { needed: 1, found: 0 }) => {}
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(&before, disk.device_mut());

    // a wider window reaches past the dirty run
    disk.set_config(Config {
        scan_window: ScanWindow::Full,
        ..Default::default()
    });
    disk.write_file(0, &[1; 100], "yes").unwrap();
    let file = disk.find(&part, "yes").unwrap().unwrap();
    assert_eq!(vec![1010], file.inode.blocks().collect::<Vec<_>>());
}

#[test]
fn free_blocks_are_zero() {
    let mut disk = formatted();
    let part = disk.partition(0).unwrap();
    for rel in (10..200u32).filter(|rel| rel % 3 != 0) {
        let mut sector = [0; SECTOR_SIZE];
        sector[rel as usize % SECTOR_SIZE] = 1;
        disk.write_sector(part.sector(rel), &sector).unwrap();
    }

    let mut start = 0;
    while let Some(block) = disk.find_free_block(&part, start).unwrap() {
        if block >= 200 {
            break;
        }
        let sector = disk.read_sector(part.sector(block)).unwrap();
        assert!(sector.iter().all(|&b| b == 0), "block {block} is not free");
        assert_eq!(0, block % 3);
        start = block + 1;
    }
}

#[test]
fn hole_after_remove() {
    let mut disk = formatted();
    for name in ["one", "two", "three"] {
        disk.write_file(0, name.as_bytes(), name).unwrap();
    }
    disk.remove_file(0, "two").unwrap();

    let part = disk.partition(0).unwrap();
    let names = |disk: &mut Disk<RamDisk>| -> Vec<String> {
        disk.list_directory(&part)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect()
    };
    assert_eq!(vec!["one", "three"], names(&mut disk));

    disk.set_config(Config {
        dir_scan: DirScan::StopAtHole,
        ..Default::default()
    });
    assert_eq!(vec!["one"], names(&mut disk));
}

#[test]
fn unformatted_partition() {
    let mut disk = formatted();
    let part = disk.partition(0).unwrap();
    disk.zero_sector(SectorId::new(part.start_sector + 1)).unwrap();

    assert_eq!(None, disk.superblock(&part).unwrap());
    assert!(disk.list_directory(&part).unwrap().is_empty());
    let err = disk.write_file(0, b"x", "x").unwrap_err();
    assert!(err.is_unformatted());
}
