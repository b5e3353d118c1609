// Tests for archive creation and extraction through the public API

use std::fs;
use std::io::Cursor;

use nexus_cli::archive::ArchiveFormat;
use nexus_cli::glob::GlobFilter;
use nexus_cli::Error;
use tempfile::TempDir;

use crate::write_file;

#[test]
fn test_every_format_restores_the_tree() {
    let source = TempDir::new().unwrap();
    write_file(source.path(), "readme.txt", "hello");
    write_file(source.path(), "lib/core.bin", "\u{0}\u{1}binary");
    write_file(source.path(), "lib/nested/deep.txt", "deep");

    for format in ArchiveFormat::ALL {
        let bytes = format
            .create_archive(source.path(), Vec::new(), &GlobFilter::match_all())
            .unwrap();
        assert!(!bytes.is_empty(), "{} produced no bytes", format.name());

        let dest = TempDir::new().unwrap();
        let count = format.extract_archive(Cursor::new(bytes), dest.path()).unwrap();
        assert_eq!(count, 3, "{}", format.name());
        assert_eq!(fs::read_to_string(dest.path().join("readme.txt")).unwrap(), "hello");
        assert_eq!(fs::read_to_string(dest.path().join("lib/nested/deep.txt")).unwrap(), "deep");
        assert_eq!(
            fs::read(dest.path().join("lib/core.bin")).unwrap(),
            b"\x00\x01binary".to_vec()
        );
    }
}

#[test]
fn test_glob_limits_archive_contents() {
    let source = TempDir::new().unwrap();
    write_file(source.path(), "keep.txt", "k");
    write_file(source.path(), "skip.log", "s");

    let filter = GlobFilter::parse("*.txt").unwrap();
    let bytes = ArchiveFormat::Zstd
        .create_archive(source.path(), Vec::new(), &filter)
        .unwrap();

    let dest = TempDir::new().unwrap();
    ArchiveFormat::Zstd.extract_archive(Cursor::new(bytes), dest.path()).unwrap();
    assert!(dest.path().join("keep.txt").exists());
    assert!(!dest.path().join("skip.log").exists());
}

#[test]
fn test_tar_entry_escaping_destination_is_rejected() {
    let mut builder = tar::Builder::new(flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default()));
    let mut header = tar::Header::new_gnu();
    header.as_gnu_mut().unwrap().name[..7].copy_from_slice(b"../evil");
    header.set_size(4);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    builder.append(&header, &b"evil"[..]).unwrap();
    let bytes = builder.into_inner().unwrap().finish().unwrap();

    let root = TempDir::new().unwrap();
    let dest = root.path().join("out");
    fs::create_dir_all(&dest).unwrap();

    let result = ArchiveFormat::Gzip.extract_archive(Cursor::new(bytes), &dest);
    assert!(matches!(result, Err(Error::PathTraversal(_))));
    assert!(!root.path().join("evil").exists());
}

#[test]
fn test_format_detection_from_names() {
    assert_eq!(ArchiveFormat::from_filename("bundle.tar.zst"), ArchiveFormat::Zstd);
    assert_eq!(ArchiveFormat::from_filename("bundle.zip"), ArchiveFormat::Zip);
    assert_eq!(ArchiveFormat::from_filename("bundle.tgz"), ArchiveFormat::Gzip);
    assert!(ArchiveFormat::has_archive_suffix("docs.tar.gz"));
    assert!(!ArchiveFormat::has_archive_suffix("docs"));
    assert!(matches!(ArchiveFormat::parse("rar"), Err(Error::UnsupportedFormat(_))));
}
