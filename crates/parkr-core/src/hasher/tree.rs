use crate::error::HashError;
use crate::scanner;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path};
use tracing::{debug, trace};

const READ_BUFFER_LENGTH: usize = 64 * 1024;

/// Whole-tree content hash of a project directory.
///
/// 1. Every regular file is digested with SHA256, streamed in 64KB chunks
/// 2. `(relative_path, file_digest)` pairs are sorted byte-wise on the path
/// 3. The tree digest is SHA256 over `relative_path || 0x00 || file_digest`
///
/// Symlinks and special files never contribute. A tree with no regular
/// files is rejected with `EmptyTree` so it can never collide with the
/// digest of a populated tree.
pub fn hash_tree(root: &Path) -> Result<String, HashError> {
    let files = scanner::regular_files(root).map_err(|source| HashError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    if files.is_empty() {
        return Err(HashError::EmptyTree(root.to_path_buf()));
    }

    let mut entries: Vec<(Vec<u8>, [u8; 32])> = Vec::with_capacity(files.len());
    for file in &files {
        let digest = hash_file(&file.path).map_err(|source| HashError::Io {
            path: file.path.clone(),
            source,
        })?;
        trace!("Hashed {}", file.relative.display());
        entries.push((relative_key(&file.relative), digest));
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut tree_hasher = Sha256::new();
    for (key, digest) in &entries {
        tree_hasher.update(key);
        tree_hasher.update([0u8]);
        tree_hasher.update(digest);
    }

    let hash = format!("{:x}", tree_hasher.finalize());
    debug!("Hashed {} files under {}: {}", entries.len(), root.display(), hash);
    Ok(hash)
}

/// SHA256 of a single file's bytes, read through a fixed buffer.
pub fn hash_file(path: &Path) -> io::Result<[u8; 32]> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_LENGTH];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().into())
}

/// Platform-independent byte key for a relative path: components joined by `/`.
fn relative_key(relative: &Path) -> Vec<u8> {
    let mut key = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            if !key.is_empty() {
                key.push(b'/');
            }
            key.extend_from_slice(part.as_encoded_bytes());
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_relative_key_uses_forward_slashes() {
        let path: PathBuf = ["src", "core", "lib.rs"].iter().collect();
        assert_eq!(relative_key(&path), b"src/core/lib.rs".to_vec());
    }

    #[test]
    fn test_hash_file_matches_sha256_of_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data.bin");
        let content = vec![0xABu8; READ_BUFFER_LENGTH * 2 + 17];
        std::fs::write(&path, &content).unwrap();

        let expected: [u8; 32] = Sha256::digest(&content).into();
        assert_eq!(hash_file(&path).unwrap(), expected);
    }
}
