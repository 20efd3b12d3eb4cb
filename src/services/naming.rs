//! Collision-free naming inside a principal's directory.
//!
//! Resolution is only a filesystem query; the result can be stale by the time
//! the caller renames into place, so promotion re-checks with a no-clobber rename.

use crate::utils::validation::MAX_FILENAME_BYTES;
use std::io;
use std::path::Path;

/// Splits `name` into base and extension (extension keeps its dot).
///
/// Leading dots belong to the base, so `.bashrc` has no extension.
pub fn split_name(name: &str) -> (&str, &str) {
    let leading = name.len() - name.trim_start_matches('.').len();
    match name[leading..].rfind('.') {
        Some(idx) => name.split_at(leading + idx),
        None => (name, ""),
    }
}

/// The `n`-th alternative for `desired`, e.g. `report_2.pdf`.
pub fn candidate(desired: &str, n: u32) -> String {
    let (base, ext) = split_name(desired);
    let suffix = format!("_{}{}", n, ext);

    let mut base_len = base.len();
    if base_len + suffix.len() > MAX_FILENAME_BYTES {
        base_len = MAX_FILENAME_BYTES.saturating_sub(suffix.len());
        while !base.is_char_boundary(base_len) {
            base_len -= 1;
        }
    }

    format!("{}{}", &base[..base_len], suffix)
}

/// Returns `desired` if it is free in `directory`, otherwise the first free
/// `base_1.ext`, `base_2.ext`, ...
pub async fn resolve(directory: &Path, desired: &str) -> io::Result<String> {
    if !tokio::fs::try_exists(directory.join(desired)).await? {
        return Ok(desired.to_string());
    }

    let mut n: u32 = 1;
    loop {
        let name = candidate(desired, n);
        if !tokio::fs::try_exists(directory.join(&name)).await? {
            return Ok(name);
        }
        n = n
            .checked_add(1)
            .ok_or_else(|| io::Error::other(format!("no free name for {}", desired)))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("report.pdf"), ("report", ".pdf"));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_name("README"), ("README", ""));
        assert_eq!(split_name(".bashrc"), (".bashrc", ""));
        assert_eq!(split_name("..hidden.txt"), ("..hidden", ".txt"));
    }

    #[test]
    fn test_candidate() {
        assert_eq!(candidate("report.pdf", 1), "report_1.pdf");
        assert_eq!(candidate("README", 3), "README_3");
    }

    #[test]
    fn test_candidate_stays_within_limit() {
        let long = format!("{}.mp4", "a".repeat(250));
        let name = candidate(&long, 12);
        assert!(name.len() <= MAX_FILENAME_BYTES);
        assert!(name.ends_with("_12.mp4"));
    }

    #[tokio::test]
    async fn test_resolve_free_name() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve(dir.path(), "a.txt").await.unwrap(), "a.txt");
    }

    #[tokio::test]
    async fn test_resolve_skips_taken_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("a_1.txt"), b"x").unwrap();

        assert_eq!(resolve(dir.path(), "a.txt").await.unwrap(), "a_2.txt");
    }

    #[tokio::test]
    async fn test_resolve_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"x").unwrap();

        let first = resolve(dir.path(), "clip.mp4").await.unwrap();
        let second = resolve(dir.path(), "clip.mp4").await.unwrap();
        assert_eq!(first, "clip_1.mp4");
        assert_eq!(first, second);
    }
}
