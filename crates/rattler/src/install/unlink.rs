//! Unlinking packages from an environment.

use std::{
    collections::HashSet,
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use fs_err::tokio as tokio_fs;
use rattler_conda_types::PrefixRecord;
use uuid::Uuid;

/// Error that can occur while unlinking a package.
#[derive(Debug, thiserror::Error)]
pub enum UnlinkError {
    /// Failed to delete a directory.
    #[error("failed to delete empty directory: {0}")]
    FailedToDeleteDirectory(String, std::io::Error),

    /// Failed to delete a file.
    #[error("failed to delete file: {0}")]
    FailedToDeleteFile(String, std::io::Error),

    /// Failed to read a directory.
    #[error("failed to read directory: {0}")]
    FailedToReadDirectory(String, std::io::Error),

    /// Failed to read a directory.
    #[error("failed to test existence: {0}")]
    FailedToTestExistence(String, std::io::Error),

    /// Failed to create a directory
    #[error("failed to create directory: {0}")]
    FailedToCreateDirectory(String, std::io::Error),

    /// Failed to move a file to the trash
    #[error("failed to move file: {0} to {1}")]
    FailedToMoveFile(String, String, std::io::Error),
}

pub(crate) fn recursively_remove_empty_directories(
    directory_path: &Path,
    target_prefix: &Path,
    is_python_noarch: bool,
    keep_directories: &HashSet<PathBuf>,
) -> Result<PathBuf, UnlinkError> {
    // Never delete the target prefix
    if directory_path == target_prefix
        || keep_directories.contains(directory_path)
        || !directory_path.exists()
    {
        return Ok(directory_path.to_path_buf());
    }

    // Should we make this stronger to protect the user?
    assert!(directory_path.starts_with(target_prefix));

    let mut read_dir = directory_path.read_dir().map_err(|e| {
        UnlinkError::FailedToReadDirectory(directory_path.to_string_lossy().to_string(), e)
    })?;

    match read_dir.next().transpose() {
        Ok(None) => {
            // The directory is empty, delete it
            std::fs::remove_dir(directory_path).map_err(|e| {
                UnlinkError::FailedToDeleteDirectory(
                    directory_path.to_string_lossy().to_string(),
                    e,
                )
            })?;

            // Recursively remove the parent directory
            if let Some(parent) = directory_path.parent() {
                recursively_remove_empty_directories(
                    parent,
                    target_prefix,
                    is_python_noarch,
                    keep_directories,
                )
            } else {
                Ok(directory_path.into())
            }
        }

        // Check if the only entry is a `__pycache__` directory
        Ok(Some(entry))
            if is_python_noarch
                && entry.file_name() == "__pycache__"
                && read_dir.next().is_none() =>
        {
            // The directory is empty, delete it
            std::fs::remove_dir_all(directory_path).map_err(|e| {
                UnlinkError::FailedToDeleteDirectory(
                    directory_path.to_string_lossy().to_string(),
                    e,
                )
            })?;

            // Recursively remove the parent directory
            if let Some(parent) = directory_path.parent() {
                recursively_remove_empty_directories(
                    parent,
                    target_prefix,
                    is_python_noarch,
                    keep_directories,
                )
            } else {
                Ok(directory_path.into())
            }
        }
        _ => Ok(directory_path.into()),
    }
}

/// Remove files in trash folder that are not currently in use.
pub async fn empty_trash(target_prefix: &Path) -> Result<(), UnlinkError> {
    let trash_dir = target_prefix.join(".trash");
    match tokio_fs::read_dir(&trash_dir).await {
        Ok(mut read_dir) => {
            let mut files_left_in_trash = false;
            while let Some(entry) = read_dir.next_entry().await.map_err(|e| {
                UnlinkError::FailedToReadDirectory(trash_dir.to_string_lossy().to_string(), e)
            })? {
                tokio_fs::remove_file(entry.path())
                    .await
                    .or_else(|e| match e.kind() {
                        ErrorKind::NotFound => Ok(()),
                        ErrorKind::PermissionDenied => {
                            files_left_in_trash = true;
                            Ok(())
                        }
                        _ => Err(UnlinkError::FailedToDeleteFile(
                            entry.path().to_string_lossy().to_string(),
                            e,
                        )),
                    })?;
            }
            if !files_left_in_trash {
                tokio_fs::remove_dir(&trash_dir).await.map_err(|e| {
                    UnlinkError::FailedToDeleteDirectory(trash_dir.to_string_lossy().to_string(), e)
                })?;
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(UnlinkError::FailedToReadDirectory(
                trash_dir.to_string_lossy().to_string(),
                e,
            ))
        }
    }

    Ok(())
}

async fn move_to_trash(target_prefix: &Path, path: &Path) -> Result<(), UnlinkError> {
    let mut trash_dest = target_prefix.join(".trash");
    match tokio::fs::try_exists(&trash_dest).await {
        Ok(true) => {}
        Ok(false) => tokio_fs::create_dir(&trash_dest).await.map_err(|e| {
            UnlinkError::FailedToCreateDirectory(trash_dest.to_string_lossy().to_string(), e)
        })?,
        Err(e) => {
            return Err(UnlinkError::FailedToTestExistence(
                trash_dest.to_string_lossy().to_string(),
                e,
            ))
        }
    }
    let mut new_filename = OsString::new();
    if let Some(file_name) = path.file_name() {
        new_filename.push(file_name);
        new_filename.push(".");
    }
    new_filename.push(format!("{}.trash", Uuid::new_v4().simple()));
    trash_dest.push(new_filename);
    match tokio_fs::rename(path, &trash_dest).await {
        Ok(_) => Ok(()),
        Err(e) => Err(UnlinkError::FailedToMoveFile(
            path.to_string_lossy().to_string(),
            trash_dest.to_string_lossy().to_string(),
            e,
        )),
    }
}

/// Completely remove the specified package from the environment.
pub async fn unlink_package(
    target_prefix: &Path,
    prefix_record: &PrefixRecord,
) -> Result<(), UnlinkError> {
    // Remove all entries
    for paths in prefix_record.paths_data.paths.iter() {
        let p = target_prefix.join(&paths.relative_path);
        match tokio_fs::remove_file(&p).await {
            Ok(_) => {}
            Err(e) => match e.kind() {
                // Simply ignore if the file is already gone.
                ErrorKind::NotFound => {}
                ErrorKind::PermissionDenied => move_to_trash(target_prefix, &p).await?,
                _ => {
                    return Err(UnlinkError::FailedToDeleteFile(
                        paths.relative_path.to_string_lossy().to_string(),
                        e,
                    ))
                }
            },
        }
    }

    // Remove the conda-meta file
    let conda_meta_path = target_prefix
        .join("conda-meta")
        .join(prefix_record.file_name());

    tokio_fs::remove_file(&conda_meta_path).await.map_err(|e| {
        UnlinkError::FailedToDeleteFile(conda_meta_path.to_string_lossy().to_string(), e)
    })?;

    Ok(())
}
