//! Functionality to validate the contents of a Conda package.
//!
//! Almost all Conda packages contain a file `info/paths.json` that describes all the files the
//! package contains. The [`validate_package_directory`] function validates that a directory
//! containing an extracted Conda package archive actually contains the files as described by the
//! `paths.json` file.
//!
//! Very old Conda packages do not contain a `paths.json` file. These packages contain a
//! (deprecated) `files` file as well as optionally a `has_prefix` and some other files. If the
//! `paths.json` file is missing these deprecated files are used instead to reconstruct a
//! [`PathsJson`] object. See [`PathsJson::from_deprecated_package_directory`] for more information.

use digest::Digest;
use rattler_conda_types::package::{IndexJson, PackageFile, PathType, PathsEntry, PathsJson};
use rattler_digest::Sha256;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// An error that is returned by [`validate_package_directory`] if the contents of the directory seems to be
/// corrupted.
#[derive(Debug, thiserror::Error)]
pub enum PackageValidationError {
    /// Neither a `paths.json` file nor a deprecated `files` file was found.
    #[error("neither a 'paths.json' or a deprecated 'files' file was found")]
    MetadataMissing,

    /// An error occurred while reading the `paths.json` file.
    #[error("failed to read 'paths.json' file")]
    ReadPathsJsonError(#[source] std::io::Error),

    /// An error occurred while reading the deprecated `files` file.
    #[error("failed to read validation data from deprecated files")]
    ReadDeprecatedPathsJsonError(#[source] std::io::Error),

    /// The path seems to be corrupted.
    #[error("the path '{0}' seems to be corrupted")]
    CorruptedEntry(PathBuf, #[source] PackageEntryValidationError),

    /// An error occurred while reading the `index.json` file.
    #[error("failed to read 'index.json'")]
    ReadIndexJsonError(#[source] std::io::Error),
}

/// An error that indicates that a specific file in a package archive directory seems to be corrupted.
#[derive(Debug, thiserror::Error)]
pub enum PackageEntryValidationError {
    /// An error occurred while reading the metadata of the file.
    #[error("failed to retrieve file metadata'")]
    GetMetadataFailed(#[source] std::io::Error),

    /// The file does not exist.
    #[error("the file does not exist")]
    NotFound,

    /// The file is not a symbolic link.
    #[error("expected a symbolic link")]
    ExpectedSymlink,

    /// The file is not a directory.
    #[error("expected a directory")]
    ExpectedDirectory,

    /// The size of the file does not match the expected size.
    #[error("incorrect size, expected {0} but file on disk is {1}")]
    IncorrectSize(u64, u64),

    /// An IO error occurred while reading the file.
    #[error("an io error occurred")]
    IoError(#[from] std::io::Error),

    /// The SHA256 hash of the file does not match the expected hash.
    #[error("sha256 hash mismatch, expected '{0}' but file on disk is '{1}'")]
    HashMismatch(String, String),
}

/// Determine whether the files in the specified directory match what is expected according to the
/// `info/paths.json` file in the same directory.
///
/// If the `info/paths.json` file could not be found this function tries to reconstruct the
/// information from older deprecated methods. See [`PathsJson::from_deprecated_package_directory`].
///
/// If validation succeeds the parsed [`PathsJson`] object is returned which contains information
/// about the files in the archive.
pub fn validate_package_directory(
    package_dir: &Path,
) -> Result<(IndexJson, PathsJson), PackageValidationError> {
    // Validate that there is a valid IndexJson
    let index_json = IndexJson::from_package_directory(package_dir)
        .map_err(PackageValidationError::ReadIndexJsonError)?;

    // Read the 'paths.json' file which describes all files that should be present. If the file
    // could not be found try reconstructing the paths information from deprecated files in the
    // package directory.
    let paths = match PathsJson::from_package_directory(package_dir) {
        Err(e) if e.kind() == ErrorKind::NotFound => {
            match PathsJson::from_deprecated_package_directory(package_dir) {
                Ok(paths) => paths,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(PackageValidationError::MetadataMissing)
                }
                Err(e) => return Err(PackageValidationError::ReadDeprecatedPathsJsonError(e)),
            }
        }
        Err(e) => return Err(PackageValidationError::ReadPathsJsonError(e)),
        Ok(paths) => paths,
    };

    // Validate all the entries
    validate_package_directory_from_paths(package_dir, &paths)
        .map_err(|(path, err)| PackageValidationError::CorruptedEntry(path, err))?;

    Ok((index_json, paths))
}

/// Determine whether the files in the specified directory match wat is expected according to the
/// passed in [`PathsJson`].
pub fn validate_package_directory_from_paths(
    package_dir: &Path,
    paths: &PathsJson,
) -> Result<(), (PathBuf, PackageEntryValidationError)> {
    // Check every entry in the PathsJson object
    for entry in paths.paths.iter() {
        validate_package_entry(package_dir, entry).map_err(|e| (entry.relative_path.clone(), e))?;
    }

    Ok(())
}

/// Determine whether the information in the [`PathsEntry`] matches the file in the package directory.
fn validate_package_entry(
    package_dir: &Path,
    entry: &PathsEntry,
) -> Result<(), PackageEntryValidationError> {
    let path = package_dir.join(&entry.relative_path);

    // Validate based on the type of path
    match entry.path_type {
        PathType::HardLink => validate_package_hard_link_entry(path, entry),
        PathType::SoftLink => validate_package_soft_link_entry(path, entry),
        PathType::Directory => validate_package_directory_entry(path, entry),
    }
}

/// Determine whether the information in the [`PathsEntry`] matches the file at the specified path.
fn validate_package_hard_link_entry(
    path: PathBuf,
    entry: &PathsEntry,
) -> Result<(), PackageEntryValidationError> {
    debug_assert!(entry.path_type == PathType::HardLink);

    // Short-circuit if we have no validation reference
    if entry.sha256.is_none() && entry.size_in_bytes.is_none() {
        if !path.is_file() {
            return Err(PackageEntryValidationError::NotFound);
        }
        return Ok(());
    }

    // Open the file for reading
    let mut file = match std::fs::File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(PackageEntryValidationError::NotFound);
        }
        Err(e) => return Err(PackageEntryValidationError::IoError(e)),
    };

    // Validate the size of the file
    if let Some(size_in_bytes) = entry.size_in_bytes {
        let actual_file_len = file
            .metadata()
            .map_err(PackageEntryValidationError::IoError)?
            .len();
        if size_in_bytes != actual_file_len {
            return Err(PackageEntryValidationError::IncorrectSize(
                size_in_bytes,
                actual_file_len,
            ));
        }
    }

    // Check the SHA256 hash of the file
    if let Some(hash_str) = &entry.sha256 {
        // Determine the hash of the file on disk
        let mut hasher = Sha256::default();
        std::io::copy(&mut file, &mut hasher)?;
        let hash = hasher.finalize();

        // Convert the expected hash to bytes.
        let mut expected_hash = rattler_digest::Sha256Hash::default();
        hex::decode_to_slice(hash_str, &mut expected_hash).map_err(|_| {
            PackageEntryValidationError::HashMismatch(hash_str.clone(), format!("{hash:x}"))
        })?;

        // Compare the two hashes
        if expected_hash != hash {
            return Err(PackageEntryValidationError::HashMismatch(
                hash_str.clone(),
                format!("{hash:x}"),
            ));
        }
    }

    Ok(())
}

/// Determine whether the information in the [`PathsEntry`] matches the symbolic link at the specified
/// path.
fn validate_package_soft_link_entry(
    path: PathBuf,
    entry: &PathsEntry,
) -> Result<(), PackageEntryValidationError> {
    debug_assert!(entry.path_type == PathType::SoftLink);

    if !path.is_symlink() {
        return Err(PackageEntryValidationError::ExpectedSymlink);
    }

    // TODO: Validate symlink content. Dont validate the SHA256 hash of the file because since a
    // symlink will most likely point to another file added as a hardlink by the package this is
    // double work. Instead check that the symlink is correct e.g. `../a` points to the same file as
    // `b/../../a` but they are different.

    Ok(())
}

/// Determine whether the information in the [`PathsEntry`] matches the directory at the specified path.
fn validate_package_directory_entry(
    path: PathBuf,
    entry: &PathsEntry,
) -> Result<(), PackageEntryValidationError> {
    debug_assert!(entry.path_type == PathType::Directory);

    if path.is_dir() {
        Ok(())
    } else {
        Err(PackageEntryValidationError::ExpectedDirectory)
    }
}

#[cfg(test)]
mod test {
    use super::{
        validate_package_directory, validate_package_directory_from_paths,
        PackageEntryValidationError, PackageValidationError,
    };
    use assert_matches::assert_matches;
    use rattler_conda_types::package::{PathType, PathsEntry, PathsJson};
    use std::io::Write;

    fn write_index_json(package_dir: &std::path::Path) {
        std::fs::create_dir_all(package_dir.join("info")).unwrap();
        std::fs::write(
            package_dir.join("info/index.json"),
            r#"{"name":"test-pkg","version":"1.0.0","build":"0","build_number":0,"subdir":"noarch","depends":[],"arch":null,"platform":null}"#,
        )
        .unwrap();
    }

    fn write_paths_json(package_dir: &std::path::Path, paths: &PathsJson) {
        std::fs::write(
            package_dir.join("info/paths.json"),
            serde_json::to_string(paths).unwrap(),
        )
        .unwrap();
    }

    fn hard_link_entry(relative_path: &str, contents: &[u8]) -> PathsEntry {
        use digest::Digest;
        use rattler_digest::Sha256;
        let hash = Sha256::digest(contents);
        PathsEntry {
            relative_path: relative_path.into(),
            path_type: PathType::HardLink,
            file_mode: Default::default(),
            prefix_placeholder: None,
            no_link: false,
            sha256: Some(format!("{hash:x}")),
            size_in_bytes: Some(contents.len() as u64),
        }
    }

    fn test_validate_package_files(relative_path: &str) {
        let temp_dir = tempfile::tempdir().unwrap();
        write_index_json(temp_dir.path());

        let contents = b"hello world";
        let entry = hard_link_entry(relative_path, contents);
        std::fs::write(temp_dir.path().join(&entry.relative_path), contents).unwrap();

        let paths = PathsJson {
            paths_version: 1,
            paths: vec![entry.clone()],
        };
        write_paths_json(temp_dir.path(), &paths);

        // Validate that the package directory is correct, since it was just written.
        let result = validate_package_directory(temp_dir.path());
        if let Err(e) = result {
            panic!("{e}");
        }

        // Corrupt the file by writing a single character to the start of it.
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .open(temp_dir.path().join(&entry.relative_path))
            .unwrap();
        file.write_all(&[255]).unwrap();
        drop(file);

        // Revalidate, given that we changed the file it should now fail with a hash mismatch.
        assert_matches!(
            validate_package_directory_from_paths(temp_dir.path(), &paths),
            Err((
                path,
                PackageEntryValidationError::HashMismatch(_, _)
            )) if path == entry.relative_path
        );
    }

    #[test]
    fn test_validate_package_files_conda() {
        test_validate_package_files("lib/test.txt");
    }

    #[test]
    #[cfg(unix)]
    fn test_validate_package_files_symlink() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_index_json(temp_dir.path());

        let target_contents = b"hello world";
        std::fs::write(temp_dir.path().join("target.txt"), target_contents).unwrap();
        std::os::unix::fs::symlink("target.txt", temp_dir.path().join("link.txt")).unwrap();

        let symlink_entry = PathsEntry {
            relative_path: "link.txt".into(),
            path_type: PathType::SoftLink,
            file_mode: Default::default(),
            prefix_placeholder: None,
            no_link: false,
            sha256: None,
            size_in_bytes: None,
        };
        let paths = PathsJson {
            paths_version: 1,
            paths: vec![symlink_entry.clone()],
        };
        write_paths_json(temp_dir.path(), &paths);

        let result = validate_package_directory(temp_dir.path());
        if let Err(e) = result {
            panic!("{e}");
        }

        // Replace the symlink with its content, it should now fail as it's no longer a symlink.
        let entry_path = temp_dir.path().join(&symlink_entry.relative_path);
        let contents = std::fs::read(&entry_path).unwrap();
        std::fs::remove_file(&entry_path).unwrap();
        std::fs::write(entry_path, contents).unwrap();

        assert_matches!(
            validate_package_directory_from_paths(temp_dir.path(), &paths),
            Err((
                path,
                PackageEntryValidationError::ExpectedSymlink
            )) if path == symlink_entry.relative_path
        );
    }

    #[test]
    fn test_missing_metadata() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert_matches!(
            validate_package_directory(temp_dir.path()),
            Err(PackageValidationError::ReadIndexJsonError(_))
        );
    }
}
