use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Clears the read-only bit so a subsequent remove can succeed.
pub fn make_writable(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    let mut permissions = metadata.permissions();
    if permissions.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        fs::set_permissions(path, permissions)?;
    }
    Ok(())
}

/// Removes a directory tree, collecting paths that could not be removed
/// instead of failing. Read-only files are made writable first. Returns
/// nothing; failures accumulate into `leftovers`.
pub fn remove_tree_collect(path: &Path, leftovers: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(_) => {
            leftovers.push(path.to_path_buf());
            return;
        }
    };

    for entry in entries.flatten() {
        let entry_path = entry.path();
        let is_dir = entry
            .file_type()
            .map(|file_type| file_type.is_dir())
            .unwrap_or(false);
        if is_dir {
            remove_tree_collect(&entry_path, leftovers);
        } else {
            let _ = make_writable(&entry_path);
            if fs::remove_file(&entry_path).is_err() {
                leftovers.push(entry_path);
            }
        }
    }

    if fs::remove_dir(path).is_err() {
        leftovers.push(path.to_path_buf());
    }
}

/// Removes every file under `path` except anything inside the `exclude`
/// subtree. Directories emptied by the sweep are removed as well.
pub fn remove_files_except(path: &Path, exclude: Option<&Path>, leftovers: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(_) => {
            leftovers.push(path.to_path_buf());
            return;
        }
    };

    for entry in entries.flatten() {
        let entry_path = entry.path();
        if exclude.is_some_and(|excluded| entry_path == excluded) {
            continue;
        }
        let is_dir = entry
            .file_type()
            .map(|file_type| file_type.is_dir())
            .unwrap_or(false);
        if is_dir {
            remove_files_except(&entry_path, exclude, leftovers);
            let _ = fs::remove_dir(&entry_path);
        } else {
            let _ = make_writable(&entry_path);
            if fs::remove_file(&entry_path).is_err() {
                leftovers.push(entry_path);
            }
        }
    }
}

/// Recursive copy preserving permission bits (`fs::copy` carries them).
pub fn copy_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(src)?;
    if metadata.is_dir() {
        fs::create_dir_all(dst)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dst.join(entry.file_name()))?;
        }
        return Ok(());
    }

    #[cfg(unix)]
    if metadata.file_type().is_symlink() {
        let target = fs::read_link(src)?;
        std::os::unix::fs::symlink(&target, dst)?;
        return Ok(());
    }

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)?;
    Ok(())
}

pub fn dir_is_empty(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
