//! Packing directory trees and reading them back

use std::fs;

use bigshot::archive::{self, HEADER_LEN};
use bigshot::ArchiveReader;

#[test]
fn two_files_pack_into_the_documented_layout() {
    let src = tempfile::tempdir().unwrap();
    fs::write(src.path().join("a.txt"), b"abc").unwrap();
    fs::create_dir(src.path().join("dir")).unwrap();
    fs::write(src.path().join("dir").join("b.txt"), b"hello").unwrap();

    let out = tempfile::tempdir().unwrap();
    let path = out.path().join("tree.bigshot");
    let entries = archive::pack(src.path(), &path).unwrap();
    assert_eq!(entries.len(), 2);

    let bytes = fs::read(&path).unwrap();
    let index = "a.txt:0:3:dir/b.txt:3:5:";
    let expected_header = format!("BIGSHOT {:>16x}", index.len());
    assert_eq!(&bytes[..HEADER_LEN as usize], expected_header.as_bytes());
    let index_end = HEADER_LEN as usize + index.len();
    assert_eq!(&bytes[HEADER_LEN as usize..index_end], index.as_bytes());
    assert_eq!(&bytes[index_end..], b"abchello");
    assert_eq!(bytes.len(), index_end + 8);

    let mut reader = ArchiveReader::open(&path).unwrap();
    assert_eq!(reader.read("dir/b.txt").unwrap(), b"hello");
    assert_eq!(reader.read("a.txt").unwrap(), b"abc");
    assert!(reader.read("missing").is_err());
}

#[test]
fn extract_recreates_the_tree() {
    let src = tempfile::tempdir().unwrap();
    for (rel, data) in [
        ("poster.jpg", &b"poster"[..]),
        ("0/0_0.jpg", b"tile zero"),
        ("0/1_0.jpg", b""),
        ("1/0_0.jpg", b"half"),
        ("descriptor", b"suffix:.jpg"),
    ] {
        let p = src.path().join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, data).unwrap();
    }

    let work = tempfile::tempdir().unwrap();
    let packed = work.path().join("out.bigshot");
    archive::pack(src.path(), &packed).unwrap();

    let target = work.path().join("restored");
    let mut reader = ArchiveReader::open(&packed).unwrap();
    assert_eq!(reader.extract_all(&target).unwrap(), 5);
    for rel in ["poster.jpg", "0/0_0.jpg", "0/1_0.jpg", "1/0_0.jpg", "descriptor"] {
        assert_eq!(
            fs::read(target.join(rel)).unwrap(),
            fs::read(src.path().join(rel)).unwrap(),
            "{rel}"
        );
    }
}

#[test]
fn empty_directory_packs_to_a_bare_header() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let path = out.path().join("empty.bigshot");
    assert!(archive::pack(src.path(), &path).unwrap().is_empty());
    assert_eq!(fs::read(&path).unwrap().len(), HEADER_LEN as usize);
    assert!(ArchiveReader::open(&path).unwrap().entries().is_empty());
}
