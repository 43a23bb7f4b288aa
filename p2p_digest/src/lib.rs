//! Content hashing, hex validation, and local file enumeration/lookup.

#[macro_use]
extern crate error_chain;

pub mod error;
pub mod index;

pub use error::{Error, ErrorKind, Result};
pub use index::FileIndex;

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// SHA-256 digest of `buf`, rendered as 64-character lowercase hex.
pub fn hash_bytes(buf: &[u8]) -> String {
    let digest = Sha256::digest(buf);
    hex::encode(digest)
}

/// Reads `path` in full and returns its SHA-256 digest as lowercase hex.
pub fn hash_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let bytes = fs::read(path.as_ref())?;
    Ok(hash_bytes(&bytes))
}

/// True iff `s` is 64 characters, all ASCII hex digits (case-insensitive).
pub fn is_valid_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Enumerates regular files under `dir`. When `recursive`, descends into
/// subdirectories (excluding `.`/`..`, which `read_dir` never yields anyway).
/// Symlinks are followed and treated as whatever they resolve to.
pub fn list_files<P: AsRef<Path>>(dir: P, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    list_files_into(dir.as_ref(), recursive, &mut out)?;
    Ok(out)
}

fn list_files_into(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(_) => return Ok(()), // fail open: unreadable dir contributes no files
    };

    for entry in read_dir.flatten() {
        let path = entry.path();
        let file_type = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(_) => continue,
        };

        if file_type.is_file() {
            out.push(path);
        } else if recursive && file_type.is_dir() {
            list_files_into(&path, recursive, out)?;
        }
    }
    Ok(())
}

/// Hashes files under `dir` (recursively) and returns the first whose digest equals
/// `hash`. Fails open: an enumeration error for a subdirectory is skipped rather than
/// aborting the whole search.
pub fn find_by_hash<P: AsRef<Path>>(dir: P, hash: &str) -> Result<Option<PathBuf>> {
    if !is_valid_hash(hash) {
        return Err(ErrorKind::InvalidHash(hash.to_owned()).into());
    }
    for path in list_files(dir, true)? {
        if let Ok(h) = hash_file(&path) {
            if h.eq_ignore_ascii_case(hash) {
                return Ok(Some(path));
            }
        }
    }
    Ok(None)
}

/// As `find_by_hash`, but matches by final path component.
pub fn find_by_name<P: AsRef<Path>>(dir: P, name: &str) -> Result<Option<PathBuf>> {
    for path in list_files(dir, true)? {
        if path.file_name().and_then(|n| n.to_str()) == Some(name) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn hash_bytes_is_lowercase_hex_64() {
        let h = hash_bytes(b"hello");
        assert_eq!(h.len(), 64);
        assert!(is_valid_hash(&h));
        assert_eq!(h, "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824");
    }

    #[test]
    fn valid_hash_rejects_bad_length_and_chars() {
        assert!(!is_valid_hash("abc"));
        assert!(!is_valid_hash(&"a".repeat(63)));
        assert!(!is_valid_hash(&"z".repeat(64)));
        assert!(is_valid_hash(&"ABCDEF0123456789".repeat(4)));
    }

    #[test]
    fn hash_file_matches_byte_exact_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::File::create(&path).unwrap().write_all(b"hello").unwrap();

        assert_eq!(
            hash_file(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );

        // trailing newline changes the digest: hashing is byte-exact, not line-exact.
        let path2 = dir.path().join("hello_nl.txt");
        std::fs::File::create(&path2).unwrap().write_all(b"hello\n").unwrap();
        assert_ne!(hash_file(&path2).unwrap(), hash_file(&path).unwrap());
    }

    #[test]
    fn list_files_recursive_and_nonrecursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("top.txt")).unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::File::create(sub.join("nested.txt")).unwrap();

        let flat = list_files(dir.path(), false).unwrap();
        assert_eq!(flat.len(), 1);

        let deep = list_files(dir.path(), true).unwrap();
        assert_eq!(deep.len(), 2);
    }

    #[test]
    fn find_by_hash_locates_exact_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::File::create(&path).unwrap().write_all(b"hello").unwrap();

        let hash = hash_file(&path).unwrap();
        let found = find_by_hash(dir.path(), &hash).unwrap().unwrap();
        assert_eq!(found, path);
    }

    #[test]
    fn find_by_hash_rejects_malformed_hash() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_by_hash(dir.path(), "not-a-hash").is_err());
    }

    #[test]
    fn empty_share_directory_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_by_name(dir.path(), "anything").unwrap().is_none());
    }
}
