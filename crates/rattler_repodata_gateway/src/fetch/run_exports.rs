//! This module provides functionality to download and cache `run_exports.json` from a remote location.

use std::path::PathBuf;
use url::Url;

use super::{CacheAction, CachedData, FetchError, Options, ProgressFunc, Variant, _fetch_data};

#[derive(Default)]
/// run_export variants
pub struct RunExportsVariants;
impl Variant for RunExportsVariants {
    fn file_name(&self) -> &'static str {
        "run_exports.json"
    }
}

impl Default for Options<RunExportsVariants> {
    fn default() -> Self {
        Self {
            cache_action: CacheAction::default(),
            variant: RunExportsVariants::default(),
            jlap_enabled: false,
            zstd_enabled: true,
            bz2_enabled: true,
        }
    }
}

/// Fetch a data file for the given channel platform url.
/// The result is cached on disk using the HTTP cache headers returned from the server.
///
/// The successful result of this function also returns a lockfile which ensures that both the state
/// and the run_exports that is pointed to remain in sync. However, not releasing the lockfile (by
/// dropping it) could block other threads and processes, it is therefore advisable to release it as
/// quickly as possible.
///
/// This method implements several different methods to download the run_exports.json file from the
/// remote:
///
/// * If a `file.json.zst` file is available in the same directory that file is downloaded
///   and decompressed.
/// * If a `file.json.bz2` file is available in the same directory that file is downloaded
///   and decompressed.
/// * Otherwise the regular `file.json` file is downloaded.
///
/// The checks to see if a `.zst` and/or `.bz2` file exist are performed by doing a HEAD request to
/// the respective URLs. The result of these are cached.
pub async fn fetch_run_exports(
    channel_platform_url: Url,
    client: reqwest_middleware::ClientWithMiddleware,
    cache_path: PathBuf,
    options: Options<RunExportsVariants>,
    progress: Option<ProgressFunc>,
) -> Result<CachedData, FetchError> {
    _fetch_data(channel_platform_url, client, cache_path, options, progress).await
}
