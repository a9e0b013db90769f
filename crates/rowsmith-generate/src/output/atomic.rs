use std::fs::{File, OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::GenerationError;

/// Write `data` to a temporary sibling of `path`, sync it, then rename it
/// over `path`. Readers see either the old file or the complete new one.
pub fn write_bytes_atomic(path: &Path, data: &[u8]) -> Result<(), GenerationError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent)?;
    }

    let tmp_path = temp_path(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    if let Err(err) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err.into());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        sync_dir(parent)?;
    }
    Ok(())
}

fn temp_path(path: &Path) -> Result<PathBuf, GenerationError> {
    let file_name = path.file_name().ok_or_else(|| {
        GenerationError::InvalidOptions(format!("'{}' is not a file path", path.display()))
    })?;
    let tmp_name = format!(".{}.{}.tmp", file_name.to_string_lossy(), uuid::Uuid::new_v4());
    Ok(path.with_file_name(tmp_name))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), GenerationError> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), GenerationError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_existing_file() {
        let dir = std::env::temp_dir().join(format!("rowsmith-atomic-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("out.sql");

        write_bytes_atomic(&path, b"first").expect("first write");
        write_bytes_atomic(&path, b"second").expect("second write");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
