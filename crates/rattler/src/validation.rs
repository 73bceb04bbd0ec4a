//! Functionality to validate the contents of a Conda package archive.
//!
//! All Conda packages contain a file `info/paths.json` that describes all the files the package contains.
//! The [`validate_package_files`] function validates that a directory containing an extracted Conda
//! package archive actually contains the files as described by the `paths.json` file.

use rattler_conda_types::package::{PathType, PathsEntry, PathsJson};
use sha2::{Digest, Sha256};
use std::fs::{File, Metadata};
use std::path::{Path, PathBuf};

/// An error that is returned by [`validate_package_files`] if the contents of the directory seems to be
/// corrupted.
#[derive(Debug, thiserror::Error)]
pub enum PackageValidationError {
    #[error("failed to read 'paths.json' file")]
    ReadPathsJsonError(#[source] std::io::Error),

    #[error("the path '{0}' seems to be corrupted")]
    CorruptedEntry(PathBuf, #[source] PackageEntryValidationError),
}

/// An error that indicates that a specific file in a package archive directory seems to be corrupted.
#[derive(Debug, thiserror::Error)]
pub enum PackageEntryValidationError {
    #[error("failed to retrieve file metadata'")]
    GetMetadataFailed(#[source] std::io::Error),

    #[error("the file does not exist")]
    NotFound,

    #[error("expected a symbolic link")]
    ExpectedSymlink,

    #[error("expected a directory")]
    ExpectedDirectory,

    #[error("incorrect size, expected {0} but file on disk is {1}")]
    IncorrectSize(u64, u64),

    #[error("an io error occurred")]
    IoError(#[from] std::io::Error),

    #[error("sha256 hash mismatch, expected '{0}' but file on disk is '{1}'")]
    HashMismatch(String, String),
}

/// Determine whether the files in the specified directory match what is expected according to the
/// `info/paths.json` file in the same directory.
pub fn validate_package_files(package_dir: &Path) -> Result<(), PackageValidationError> {
    // Read the 'paths.json' file which describes all files that should be present
    let paths = PathsJson::from_path(&package_dir.join("info/paths.json"))
        .map_err(PackageValidationError::ReadPathsJsonError)?;

    // Check every entry
    for entry in paths.paths {
        validate_package_entry(package_dir, &entry)
            .map_err(|e| PackageValidationError::CorruptedEntry(entry.relative_path, e))?;
    }

    Ok(())
}

/// Determine whether the information in the [`PathsEntry`] matches the file in the package directory.
fn validate_package_entry(
    package_dir: &Path,
    entry: &PathsEntry,
) -> Result<(), PackageEntryValidationError> {
    let path = package_dir.join(&entry.relative_path);

    // Get the metadata for the entry
    let metadata = match std::fs::symlink_metadata(&path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PackageEntryValidationError::NotFound)
        }
        Err(e) => return Err(PackageEntryValidationError::GetMetadataFailed(e)),
    };

    // Validate based on the type of path
    match entry.path_type {
        PathType::HardLink => validate_package_hard_link_entry(path, entry, metadata),
        PathType::SoftLink => validate_package_soft_link_entry(path, entry, metadata),
        PathType::Directory => validate_package_directory_entry(path, entry, metadata),
    }
}

/// Determine whether the information in the [`PathsEntry`] matches the file at the specified path.
fn validate_package_hard_link_entry(
    path: PathBuf,
    entry: &PathsEntry,
    metadata: Metadata,
) -> Result<(), PackageEntryValidationError> {
    debug_assert!(entry.path_type == PathType::HardLink);

    // Validate the size of the file
    if let Some(size_in_bytes) = entry.size_in_bytes {
        if size_in_bytes != metadata.len() {
            return Err(PackageEntryValidationError::IncorrectSize(
                size_in_bytes,
                metadata.len(),
            ));
        }
    }

    // Check the SHA256 hash of the file
    if let Some(hash_str) = entry.sha256.as_deref() {
        // Determine the hash of the file on disk
        let hash = compute_file_sha256(&path)?;

        // Convert the hash to bytes.
        let mut expected_hash = <sha2::digest::Output<Sha256>>::default();
        hex::decode_to_slice(hash_str, &mut expected_hash).map_err(|_| {
            PackageEntryValidationError::HashMismatch(hash_str.to_owned(), format!("{:x}", hash))
        })?;

        // Compare the two hashes
        if expected_hash != hash {
            return Err(PackageEntryValidationError::HashMismatch(
                hash_str.to_owned(),
                format!("{:x}", hash),
            ));
        }
    }

    Ok(())
}

/// Determine whether the information in the [`PathsEntry`] matches the symbolic link at the specified
/// path.
fn validate_package_soft_link_entry(
    _path: PathBuf,
    entry: &PathsEntry,
    metadata: Metadata,
) -> Result<(), PackageEntryValidationError> {
    debug_assert!(entry.path_type == PathType::SoftLink);

    if !metadata.is_symlink() {
        return Err(PackageEntryValidationError::ExpectedSymlink);
    }

    // TODO: Validate symlink content

    Ok(())
}

/// Determine whether the information in the [`PathsEntry`] matches the directory at the specified path.
fn validate_package_directory_entry(
    _path: PathBuf,
    entry: &PathsEntry,
    metadata: Metadata,
) -> Result<(), PackageEntryValidationError> {
    debug_assert!(entry.path_type == PathType::Directory);

    if !metadata.is_dir() {
        Err(PackageEntryValidationError::ExpectedDirectory)
    } else {
        Ok(())
    }
}

/// Compute the SHA256 hash of the file at the specified location.
fn compute_file_sha256(path: &Path) -> Result<sha2::digest::Output<sha2::Sha256>, std::io::Error> {
    // Open the file for reading
    let mut file = File::open(path)?;

    // Determine the hash of the file on disk
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;

    Ok(hasher.finalize())
}
