//! This module provides functionality to download and cache `repodata.json` from a remote location.

use std::path::PathBuf;
use tracing::instrument;
use url::Url;

use super::{CachedData, FetchError, Options, ProgressFunc, Variant};

/// dpcs
pub type FetchRepoDataOptions = Options<RepoDataVariant>;

/// Defines which type of repodata.json file to download. Usually you want to use the
/// [`Variant::AfterPatches`] variant because that reflects the repodata with any patches applied.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub enum RepoDataVariant {
    /// Fetch the `repodata.json` file. This `repodata.json` has repodata patches applied. Packages
    /// may have also been removed from this file (yanked).
    #[default]
    AfterPatches,

    /// Fetch the `repodata_from_packages.json` file. This file contains all packages with the
    /// information extracted from their index.json file. This file is not patched and contains all
    /// packages ever uploaded.
    ///
    /// Note that this file is not available for all channels. This only seems to be available for
    /// the conda-forge and bioconda channels on anaconda.org.
    FromPackages,

    /// Fetch `current_repodata.json` file. This file contains only the latest version of each
    /// package.
    ///
    /// Note that this file is not available for all channels. This only seems to be available for
    /// the conda-forge and bioconda channels on anaconda.org.
    Current,
}

impl Variant for RepoDataVariant {
    fn file_name(&self) -> &'static str {
        match self {
            RepoDataVariant::AfterPatches => "repodata.json",
            RepoDataVariant::FromPackages => "repodata_from_packages.json",
            RepoDataVariant::Current => "current_repodata.json",
        }
    }
}

/// Fetch the repodata.json file for the given subdirectory. The result is cached on disk using the
/// HTTP cache headers returned from the server.
///
/// The successful result of this function also returns a lockfile which ensures that both the state
/// and the repodata that is pointed to remain in sync. However, not releasing the lockfile (by
/// dropping it) could block other threads and processes, it is therefore advisable to release it as
/// quickly as possible.
///
/// This method implements several different methods to download the repodata.json file from the
/// remote:
///
/// * If a `repodata.json.zst` file is available in the same directory that file is downloaded
///   and decompressed.
/// * If a `repodata.json.bz2` file is available in the same directory that file is downloaded
///   and decompressed.
/// * Otherwise the regular `repodata.json` file is downloaded.
///
/// The checks to see if a `.zst` and/or `.bz2` file exist are performed by doing a HEAD request to
/// the respective URLs. The result of these are cached.
#[instrument(err, skip_all, fields(subdir_url, cache_path = %cache_path.display()))]
pub async fn fetch_repo_data(
    subdir_url: Url,
    client: reqwest_middleware::ClientWithMiddleware,
    cache_path: PathBuf,
    options: FetchRepoDataOptions,
    progress: Option<ProgressFunc>,
) -> Result<CachedData, FetchError> {
    super::_fetch_data(subdir_url, client, cache_path, options, progress).await
}
