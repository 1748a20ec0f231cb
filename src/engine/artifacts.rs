use crate::error::BuildResult;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Shared library names the native proxy build may produce.
pub const PROXY_LIBRARIES: &[&str] = &["libV8_Net_Proxy.so", "libV8_Net_Proxy.dylib"];

/// Copies `src` into `dest_dir` when it is a regular file. A missing source
/// is not an error.
pub async fn copy_if_present(src: &Path, dest_dir: &Path) -> BuildResult<Option<PathBuf>> {
    let is_file = match tokio::fs::metadata(src).await {
        Ok(md) => md.is_file(),
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => return Err(e.into()),
    };

    if !is_file {
        debug!("{} not built, skipping", src.display());
        return Ok(None);
    }

    let file_name = match src.file_name() {
        Some(name) => name,
        None => return Ok(None),
    };

    let dest = dest_dir.join(file_name);
    tokio::fs::create_dir_all(dest_dir).await?;
    tokio::fs::copy(src, &dest).await?;
    info!("copied {} to {}", src.display(), dest_dir.display());

    Ok(Some(dest))
}

/// Copies every regular file directly inside `src_dir` into `dest_dir`.
/// Subdirectories and other non-regular entries are skipped.
pub async fn copy_regular_files(src_dir: &Path, dest_dir: &Path) -> BuildResult<Vec<PathBuf>> {
    let mut copied = vec![];
    let mut entries = tokio::fs::read_dir(src_dir).await?;
    tokio::fs::create_dir_all(dest_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        match tokio::fs::metadata(entry.path()).await {
            Ok(md) if md.is_file() => {}
            _ => continue,
        }

        let dest = dest_dir.join(entry.file_name());
        tokio::fs::copy(entry.path(), &dest).await?;
        copied.push(dest);
    }

    info!(
        "copied {} files from {} to {}",
        copied.len(),
        src_dir.display(),
        dest_dir.display()
    );

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_libraries_are_silently_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("BuildResult/release");

        for library in PROXY_LIBRARIES {
            let copied = copy_if_present(&dir.path().join(library), &dest)
                .await
                .unwrap();
            assert_eq!(copied, None);
        }

        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn each_library_variant_is_copied_when_present() {
        for library in PROXY_LIBRARIES {
            let dir = tempfile::tempdir().unwrap();
            let src = dir.path().join("lib.target").join(library);
            std::fs::create_dir_all(src.parent().unwrap()).unwrap();
            std::fs::write(&src, b"elf").unwrap();

            let dest = dir.path().join("BuildResult/debug");
            let copied = copy_if_present(&src, &dest).await.unwrap();

            assert_eq!(copied, Some(dest.join(library)));
            assert_eq!(std::fs::read(dest.join(library)).unwrap(), b"elf");
        }
    }

    #[tokio::test]
    async fn directory_with_library_name_is_not_copied() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join(PROXY_LIBRARIES[0]);
        std::fs::create_dir_all(&src).unwrap();

        let copied = copy_if_present(&src, &dir.path().join("out")).await.unwrap();
        assert_eq!(copied, None);
    }

    #[tokio::test]
    async fn only_regular_files_are_copied() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("bin/Debug");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("V8.Net.dll"), b"dll").unwrap();
        std::fs::write(src.join("V8.NET-Console.exe"), b"exe").unwrap();
        std::fs::write(src.join("nested/skipped.txt"), b"no").unwrap();

        let dest = dir.path().join("BuildResult/debug");
        let mut copied = copy_regular_files(&src, &dest).await.unwrap();
        copied.sort();

        assert_eq!(
            copied,
            vec![dest.join("V8.NET-Console.exe"), dest.join("V8.Net.dll")]
        );
        assert!(!dest.join("nested").exists());
    }

    #[tokio::test]
    async fn missing_output_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = copy_regular_files(&dir.path().join("bin/Release"), &dir.path().join("out")).await;
        assert!(result.is_err());
    }
}
