use miniar::archive::{self, ArchiveOptions};
use miniar::frame::MAX_PATH_LEN;
use miniar::{locate, ArchiveError, ArchiveWriter, CodecId, Entry, ErrorClass, Located};
use proptest::prelude::*;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::Path;
use std::rc::Rc;
use tempfile::tempdir;

/// Relative path → `Some(content)` for files, `None` for directories.
type Tree = BTreeMap<String, Option<Vec<u8>>>;

fn build_tree(root: &Path, tree: &Tree) {
    for (rel, content) in tree {
        let path = root.join(rel);
        match content {
            None => fs::create_dir_all(&path).unwrap(),
            Some(data) => {
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, data).unwrap();
            }
        }
    }
}

fn read_tree(root: &Path) -> Tree {
    let mut out = Tree::new();
    for entry in walkdir::WalkDir::new(root).min_depth(1) {
        let entry = entry.unwrap();
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap()
            .components()
            .map(|c| c.as_os_str().to_str().unwrap())
            .collect::<Vec<_>>()
            .join("/");
        if entry.file_type().is_dir() {
            out.insert(rel, None);
        } else {
            out.insert(rel, Some(fs::read(entry.path()).unwrap()));
        }
    }
    out
}

fn sample_tree() -> Tree {
    let mut t = Tree::new();
    t.insert("x.txt".into(), Some(b"hi".to_vec()));
    t.insert("sub".into(), None);
    t.insert("sub/y.txt".into(), Some(Vec::new()));
    t.insert("sub/deeper".into(), None);
    t.insert("sub/deeper/data.bin".into(), Some((0..5000u32).map(|i| (i * 7) as u8).collect()));
    t.insert("empty".into(), None);
    t.insert("\u{65e5}\u{672c}".into(), None);
    t.insert("\u{65e5}\u{672c}/\u{8a9e}.txt".into(), Some("unicode".into()));
    t
}

fn pack(root: &Path, opts: &ArchiveOptions) -> Vec<u8> {
    archive::archive(root, Vec::new(), opts).unwrap().0
}

#[test]
fn test_concrete_scenario() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("x.txt"), b"hi").unwrap();
    fs::create_dir(src.path().join("sub")).unwrap();
    fs::write(src.path().join("sub/y.txt"), b"").unwrap();

    let bytes = pack(src.path(), &ArchiveOptions::default());
    let dst = tempdir().unwrap();
    archive::unarchive(Cursor::new(bytes), dst.path()).unwrap();

    assert_eq!(fs::read(dst.path().join("x.txt")).unwrap(), b"hi");
    assert_eq!(fs::metadata(dst.path().join("sub/y.txt")).unwrap().len(), 0);
    assert!(dst.path().join("sub").is_dir());
}

#[test]
fn test_roundtrip_without_root() {
    let tree = sample_tree();
    let src = tempdir().unwrap();
    build_tree(src.path(), &tree);

    let bytes = pack(src.path(), &ArchiveOptions::raw());
    let dst = tempdir().unwrap();
    let summary = archive::unarchive(&bytes[..], dst.path()).unwrap();

    assert_eq!(read_tree(dst.path()), tree);
    assert_eq!(summary.files, 4);
    assert_eq!(summary.directories, 4);
}

#[test]
fn test_roundtrip_with_root() {
    let tree = sample_tree();
    let parent = tempdir().unwrap();
    let root = parent.path().join("site");
    fs::create_dir(&root).unwrap();
    build_tree(&root, &tree);

    let opts = ArchiveOptions { include_root: true, ..ArchiveOptions::default() };
    let bytes = pack(&root, &opts);

    let entries = archive::list(&bytes[..]).unwrap();
    assert_eq!(entries[0], Entry::Directory { path: "site".into() });
    assert!(entries.iter().all(|e| e.path().starts_with("site")));

    let dst = tempdir().unwrap();
    archive::unarchive(&bytes[..], dst.path()).unwrap();
    let mut expected = Tree::new();
    expected.insert("site".into(), None);
    for (k, v) in &tree {
        expected.insert(format!("site/{k}"), v.clone());
    }
    assert_eq!(read_tree(dst.path()), expected);
}

#[test]
fn test_compressed_and_raw_restore_identically() {
    let tree = sample_tree();
    let src = tempdir().unwrap();
    build_tree(src.path(), &tree);

    for codec in [CodecId::None, CodecId::Gzip, CodecId::Zstd, CodecId::Lz4] {
        let opts = ArchiveOptions { codec, ..ArchiveOptions::default() };
        let bytes = pack(src.path(), &opts);
        assert!(bytes.starts_with(codec.magic()));
        let dst = tempdir().unwrap();
        archive::unarchive(&bytes[..], dst.path()).unwrap();
        assert_eq!(read_tree(dst.path()), tree, "{} roundtrip", codec.name());
    }
}

#[test]
fn test_empty_directory_restored() {
    let parent = tempdir().unwrap();
    let root = parent.path().join("hollow");
    fs::create_dir(&root).unwrap();

    let raw = pack(&root, &ArchiveOptions::raw());
    assert_eq!(raw, [0x01, 0x00]);

    let opts = ArchiveOptions { include_root: true, ..ArchiveOptions::default() };
    let bytes = pack(&root, &opts);
    let dst = tempdir().unwrap();
    archive::unarchive(&bytes[..], dst.path()).unwrap();
    let restored = dst.path().join("hollow");
    assert!(restored.is_dir());
    assert_eq!(fs::read_dir(&restored).unwrap().count(), 0);
}

#[test]
fn test_pre_order_and_sorted_siblings() {
    let src = tempdir().unwrap();
    fs::create_dir_all(src.path().join("b/inner")).unwrap();
    fs::write(src.path().join("b/inner/z"), b"z").unwrap();
    fs::write(src.path().join("a"), b"a").unwrap();
    fs::write(src.path().join("c"), b"c").unwrap();

    let entries = archive::list(&pack(src.path(), &ArchiveOptions::raw())[..]).unwrap();
    let paths: Vec<&str> = entries.iter().map(Entry::path).collect();
    assert_eq!(paths, ["a", "b", "b/inner", "b/inner/z", "c"]);
}

#[test]
fn test_path_length_limit() {
    let mut ok = ArchiveWriter::new(Vec::new()).unwrap();
    ok.add_bytes(&"p".repeat(MAX_PATH_LEN), b"x").unwrap();

    let mut w = ArchiveWriter::new(Vec::new()).unwrap();
    let err = w.add_bytes(&"p".repeat(MAX_PATH_LEN + 1), b"x").unwrap_err();
    assert!(matches!(err, ArchiveError::PathTooLong { len } if len == MAX_PATH_LEN + 1));
    assert_eq!(err.class(), ErrorClass::FormatViolation);
}

#[test]
fn test_locate_found_and_missing() {
    let tree = sample_tree();
    let src = tempdir().unwrap();
    build_tree(src.path(), &tree);
    let bytes = pack(src.path(), &ArchiveOptions::default());

    match locate(&bytes[..], "sub/deeper/data.bin").unwrap() {
        Located::Found { entry, mut reader } => {
            let expected = tree["sub/deeper/data.bin"].clone().unwrap();
            assert_eq!(entry.content_len() as usize, expected.len());
            let mut got = Vec::new();
            reader.read_to_end(&mut got).unwrap();
            assert_eq!(got, expected);
        }
        Located::NotFound => panic!("entry not located"),
    }

    assert!(!locate(&bytes[..], "does/not/exist").unwrap().is_found());
}

#[test]
fn test_locate_through_archive_file() {
    let src = tempdir().unwrap();
    fs::create_dir(src.path().join("a")).unwrap();
    fs::write(src.path().join("a/b.txt"), b"needle").unwrap();
    let out = tempdir().unwrap();
    let file = out.path().join("tree.mar");
    archive::create(src.path(), &file, &ArchiveOptions::default()).unwrap();

    match archive::open_entry(&file, "a/b.txt").unwrap() {
        Located::Found { mut reader, .. } => {
            let mut s = String::new();
            reader.read_to_string(&mut s).unwrap();
            assert_eq!(s, "needle");
        }
        Located::NotFound => panic!("a/b.txt not located"),
    }

    let restored = out.path().join("restored");
    archive::extract(&file, &restored).unwrap();
    assert_eq!(fs::read(restored.join("a/b.txt")).unwrap(), b"needle");
}

/// Records the largest buffer any single read was asked to fill.
struct Instrumented<R> {
    inner:    R,
    max_read: Rc<Cell<usize>>,
    total:    Rc<Cell<u64>>,
}

impl<R: Read> Read for Instrumented<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.max_read.set(self.max_read.get().max(buf.len()));
        let n = self.inner.read(buf)?;
        self.total.set(self.total.get() + n as u64);
        Ok(n)
    }
}

#[test]
fn test_locate_skips_payloads_without_buffering() {
    const BIG: usize = 4 * 1024 * 1024;
    for opts in [ArchiveOptions::raw(), ArchiveOptions::default()] {
        let mut w = ArchiveWriter::with_options(Vec::new(), &opts).unwrap();
        w.add_bytes("big/one.bin", &vec![0xAB; BIG]).unwrap();
        w.add_bytes("big/two.bin", &vec![0xCD; BIG]).unwrap();
        w.add_bytes("target.txt", b"found me").unwrap();
        let bytes = w.finish().unwrap();

        let max_read = Rc::new(Cell::new(0));
        let total = Rc::new(Cell::new(0));
        let source = Instrumented {
            inner:    Cursor::new(&bytes),
            max_read: max_read.clone(),
            total:    total.clone(),
        };

        match locate(source, "target.txt").unwrap() {
            Located::Found { mut reader, .. } => {
                let mut s = String::new();
                reader.read_to_string(&mut s).unwrap();
                assert_eq!(s, "found me");
            }
            Located::NotFound => panic!("target not located ({})", opts.codec.name()),
        }

        // streamed through bounded buffers, never a payload-sized one
        assert!(
            max_read.get() <= 64 * 1024,
            "{}: largest read was {} bytes",
            opts.codec.name(),
            max_read.get()
        );
        assert!(total.get() <= bytes.len() as u64);
        if opts.codec == CodecId::None {
            assert_eq!(total.get(), bytes.len() as u64);
        }
    }
}

/// Bytes that no codec can shrink much.
fn noise(len: usize) -> Vec<u8> {
    let mut state = 0x9e37_79b9_u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

#[test]
fn test_truncated_archive_is_corruption() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("a.bin"), noise(512 * 1024)).unwrap();
    fs::write(src.path().join("b.bin"), b"tail entry").unwrap();

    for codec in [CodecId::None, CodecId::Gzip, CodecId::Zstd, CodecId::Lz4] {
        let opts = ArchiveOptions { codec, ..ArchiveOptions::default() };
        let mut bytes = pack(src.path(), &opts);
        bytes.truncate(bytes.len() / 2);

        let dst = tempdir().unwrap();
        let err = archive::unarchive(&bytes[..], dst.path()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::StreamCorruption, "{} unarchive: {err}", codec.name());

        let Err(err) = locate(&bytes[..], "b.bin") else {
            panic!("{}: locate succeeded on a truncated archive", codec.name());
        };
        assert_eq!(err.class(), ErrorClass::StreamCorruption, "{} locate: {err}", codec.name());
    }

    // cut inside the final frame of a raw container
    let mut bytes = pack(src.path(), &ArchiveOptions::raw());
    bytes.truncate(bytes.len() - 4);
    let dst = tempdir().unwrap();
    let err = archive::unarchive(&bytes[..], dst.path()).unwrap_err();
    assert_eq!(err.class(), ErrorClass::StreamCorruption);
}

#[test]
fn test_unsafe_paths_refused() {
    let mut w = ArchiveWriter::with_options(Vec::new(), &ArchiveOptions::raw()).unwrap();
    w.add_bytes("../escape.txt", b"nope").unwrap();
    let bytes = w.finish().unwrap();

    let parent = tempdir().unwrap();
    let dst = parent.path().join("out");
    let err = archive::unarchive(&bytes[..], &dst).unwrap_err();
    assert!(matches!(err, ArchiveError::UnsafePath(_)));
    assert!(!parent.path().join("escape.txt").exists());
}

#[cfg(unix)]
#[test]
fn test_symlinks_not_archived() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("real.txt"), b"real").unwrap();
    std::os::unix::fs::symlink(src.path().join("real.txt"), src.path().join("link.txt")).unwrap();

    let entries = archive::list(&pack(src.path(), &ArchiveOptions::raw())[..]).unwrap();
    assert_eq!(entries, vec![Entry::File { path: "real.txt".into(), len: 4 }]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_roundtrip(
        files in prop::collection::btree_map(
            "[a-z]{1,6}(/[a-z]{1,6}){0,2}",
            prop::collection::vec(any::<u8>(), 0..512),
            1..8,
        ),
        include_root: bool,
        compress: bool,
    ) {
        // a path may not be both a file and a directory prefix of another
        let names: Vec<&String> = files.keys().collect();
        prop_assume!(names.iter().all(|a| names.iter().all(|b| !b.starts_with(&format!("{a}/")))));

        let parent = tempdir().unwrap();
        let root = parent.path().join("root");
        fs::create_dir(&root).unwrap();
        let tree: Tree = files.into_iter().map(|(k, v)| (k, Some(v))).collect();
        build_tree(&root, &tree);

        let opts = ArchiveOptions {
            include_root,
            codec: if compress { CodecId::Gzip } else { CodecId::None },
            ..ArchiveOptions::default()
        };
        let bytes = pack(&root, &opts);
        let dst = tempdir().unwrap();
        archive::unarchive(&bytes[..], dst.path()).unwrap();

        let restored = if include_root { dst.path().join("root") } else { dst.path().to_path_buf() };
        prop_assert_eq!(read_tree(&restored), read_tree(&root));
    }
}
