//! # JLAP
//!
//! This module contains functions and data types for downloading and applying patches from JLAP
//! files.
//!
//! JLAP files provide a way to incrementally retrieve and build the `repodata.json` files
//! that conda compatible applications use to query conda packages. For more information about
//! how this file format works, please read this CEP proposal:
//!
//! - <https://github.com/conda-incubator/ceps/pull/20/files>
//!
//! ## Example
//!
//! The recommended way to use this module is by using the JLAPManager struct. This struct is meant
//! to act as a kind of "facade" object which orchestrates the underlying operations necessary
//! to fetch JLAP data used to update our current `repodata.json` file.
//!
//! Below is an example of how to initialize the struct and patch an existing `repodata.json` file:
//!
//! ```no_run
//! use std::{path::Path};
//! use reqwest::Client;
//! use url::Url;
//!
//! use rattler_digest::{compute_bytes_digest, Blake2b256};
//! use rattler_repodata_gateway::fetch::jlap::{patch_repo_data, JLAPState, RepoDataState};
//!
//! #[tokio::main]
//! pub async fn main() {
//!     let subdir_url = Url::parse("https://conda.anaconda.org/conda-forge/osx-64/").unwrap();
//!     let client = Client::new();
//!     let cache = Path::new("./cache");
//!     let current_repo_data = cache.join("c93ef9c9.json");
//!
//!     let repo_data_state: RepoDataState =  serde_json::from_str(r#"{
//!        "url": "https://conda.anaconda.org/conda-forge/osx-64/repodata.json.zst",
//!        "etag": "W/\"49aa6d9ea6f3285efe657780a7c8cd58\"",
//!        "mod": "Tue, 30 May 2023 20:03:48 GMT",
//!        "cache_control": "public, max-age=30",
//!        "mtime_ns": 1685509481332236078,
//!        "size": 38317593,
//!        "blake2_hash": "580100cb35459305eaaa31feeebacb06aad6422257754226d832e504666fc1c6",
//!        "has_zst": {
//!          "value": true,
//!          "last_checked": "2023-05-21T12:14:21.904003Z"
//!        },
//!        "has_bz2": {
//!          "value": true,
//!          "last_checked": "2023-05-21T12:14:21.904003Z"
//!        },
//!        "has_jlap": {
//!          "value": true,
//!          "last_checked": "2023-05-21T12:14:21.903512Z"
//!        },
//!        "jlap": {
//!          "iv": "0000000000000000000000000000000000000000000000000000000000000000",
//!          "pos": 0,
//!          "footer": {
//!            "url": "repodata.json",
//!            "latest": "580100cb35459305eaaa31feeebacb06aad6422257754226d832e504666fc1c6"
//!          }
//!        }
//!      }"#).unwrap();
//!
//!     // Patches `current_repo_data` and returns an updated JLAP state object
//!     let updated_jlap_state = patch_repo_data(
//!         &client,
//!         subdir_url,
//!         repo_data_state,
//!         &current_repo_data
//!     ).await.unwrap();
//!
//!     // Now we can use the `updated_jlap_state` object to update our `.state.json` file
//! }
//! ```
//!
//! ## TODO
//!
//! The following items still need to be implemented before this module should be considered
//! complete:
//!  - Use the checksum to validate our JLAP file after we update it
//!  - Our tests do not exhaustively cover our error states. Some of these are pretty easy to
//!    trigger (e.g. invalid JLAP file or invalid JSON within), so we should definitely make
//!    tests for them.

use blake2::digest::Output;
use rattler_digest::{compute_bytes_digest, Blake2b256};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client, Response,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::fetch::cache;
pub use crate::fetch::cache::{JLAPFooter, JLAPState, RepoDataState};

/// File suffix for JLAP file
pub const JLAP_FILE_SUFFIX: &str = "jlap";

/// File name of JLAP file
pub const JLAP_FILE_NAME: &str = "repodata.jlap";

/// File suffix for JLAP files
pub const JLAP_FOOTER_OFFSET: usize = 2;

/// Represents the variety of errors that we come across while processing JLAP files
#[derive(Debug, thiserror::Error)]
pub enum JLAPError {
    #[error(transparent)]
    /// Pass-thru for JSON errors found while parsing JLAP file
    JSONParseError(serde_json::Error),

    #[error(transparent)]
    /// Pass-thru for JSON errors found while patching
    JSONPatchError(json_patch::PatchError),

    #[error(transparent)]
    /// Pass-thru for HTTP errors encountered while requesting JLAP
    HTTPError(reqwest::Error),

    #[error(transparent)]
    /// Pass-thru for file system errors encountered while requesting JLAP
    FileSystemError(tokio::io::Error),

    #[error("No patches found in the JLAP file")]
    /// Error returned when JLAP file has no patches in it
    NoPatchesFoundError,

    #[error("No matching hashes can be found in the JLAP file")]
    /// Error returned when none of the patches match the hash of our current `repodata.json`
    NoHashFoundError,

    #[error("Hash from the JLAP metadata and hash from updated repodata file do not match")]
    /// Error when we have mismatched hash values after updating our `repodata.json` file
    /// At this point, we should consider the `repodata.json` file corrupted and fetch a new
    /// version from the server.
    HashesNotMatchingError,
}

/// Represents the numerous patches found in a JLAP file which makes up a majority
/// of the file
#[derive(Serialize, Deserialize, Debug)]
pub struct Patch {
    /// Next hash of `repodata.json` file
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "cache::deserialize_blake2_hash",
        serialize_with = "cache::serialize_blake2_hash"
    )]
    pub to: Option<Output<Blake2b256>>,

    /// Previous hash of `repodata.json` file
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "cache::deserialize_blake2_hash",
        serialize_with = "cache::serialize_blake2_hash"
    )]
    pub from: Option<Output<Blake2b256>>,

    /// Patches to apply to current `repodata.json` file
    pub patch: json_patch::Patch, // [] is a valid, empty patch
}

/// Attempts to patch a current `repodata.json` file
///
/// This method first makes a request to fetch JLAP data we need. It relies on the information we
/// pass via the `jlap_state` argument to retrieve the correct response.
///
/// After this, it will apply JSON patches to the file located at `repo_data_json_path`.
/// At the end, we compare the new `blake2b` hash with what was listed in the JLAP metadata to
/// ensure the file is correct.
///
/// The return value is the updated `blake2b` hash.
pub async fn patch_repo_data(
    client: &Client,
    subdir_url: Url,
    repo_data_state: RepoDataState,
    repo_data_json_path: &Path,
) -> Result<JLAPState, JLAPError> {
    let jlap_state = repo_data_state.jlap.unwrap_or_default();
    let jlap_url = subdir_url.join(JLAP_FILE_NAME).unwrap();
    let range = format!("bytes={}-", jlap_state.pos);

    let response = match fetch_jlap(jlap_url.as_str(), client, range).await {
        Ok(response) => response,
        Err(error) => {
            return Err(JLAPError::HTTPError(error));
        }
    };

    let response_text = response.text().await.unwrap();
    let new_initial_vector = get_initial_vector(&response_text).unwrap_or(jlap_state.iv);
    let new_bytes_offset = calculate_bytes_offset(&response_text) as u64;

    // Get the patches and apply the new patches if any found
    let (footer, patches) = get_jlap_data(&response_text).await?;

    let hash = repo_data_state.blake2_hash.unwrap_or_default();
    let latest_hash = footer.latest.unwrap_or_default();

    // We already have the latest version; return early because there's nothing to do
    if latest_hash == hash {
        let new_state = JLAPState {
            pos: jlap_state.pos + new_bytes_offset,
            iv: new_initial_vector,
            footer,
        };
        return Ok(new_state);
    }

    // We use the current hash to find which patches we need to apply
    let current_idx = find_current_patch_index(&patches, hash);

    return if let Some(idx) = current_idx {
        let applicable_patches: Vec<&Patch> = patches[idx..patches.len()].iter().collect();
        let new_hash = apply_jlap_patches(&applicable_patches, repo_data_json_path).await?;

        if new_hash != latest_hash {
            return Err(JLAPError::HashesNotMatchingError);
        }

        let new_bytes_offset = calculate_bytes_offset(&response_text) as u64;

        let new_state = JLAPState {
            pos: jlap_state.pos + new_bytes_offset,
            iv: new_initial_vector,
            footer,
        };

        Ok(new_state)
    } else {
        Err(JLAPError::NoHashFoundError)
    };
}

/// Fetches a JLAP response from server
pub async fn fetch_jlap(
    url: &str,
    client: &Client,
    range: String,
) -> Result<Response, reqwest::Error> {
    let request_builder = client.get(url);
    let mut headers = HeaderMap::default();

    headers.insert(
        reqwest::header::RANGE,
        HeaderValue::from_str(&range).unwrap(),
    );

    request_builder.headers(headers).send().await
}

/// Utility function to calculate the bytes offset for the next JLAP request
pub fn calculate_bytes_offset(jlap_response: &str) -> usize {
    let mut lines: Vec<&str> = jlap_response.split('\n').collect();
    let length = lines.len();

    if length >= JLAP_FOOTER_OFFSET {
        lines.truncate(length - JLAP_FOOTER_OFFSET);
        let patches = lines.join("\n");
        return patches.into_bytes().len();
    }

    0
}

fn parse_patch_json(line: &&str) -> Result<Patch, JLAPError> {
    serde_json::from_str(line).map_err(JLAPError::JSONParseError)
}

/// Builds a new JLAP object based on the response
pub async fn get_jlap_data(jlap_response: &str) -> Result<(JLAPFooter, Vec<Patch>), JLAPError> {
    let parts: Vec<&str> = jlap_response.split('\n').collect();
    let length = parts.len();

    if parts.len() > 2 {
        let footer = parts[length - 2];

        let metadata: JLAPFooter = match serde_json::from_str(footer) {
            Ok(value) => value,
            Err(err) => return Err(JLAPError::JSONParseError(err)),
        };

        let patch_lines = parts[1..length - JLAP_FOOTER_OFFSET].iter();
        let patches: Result<Vec<Patch>, JLAPError> = patch_lines.map(parse_patch_json).collect();

        match patches {
            Ok(patches) => {
                if !patches.is_empty() {
                    Ok((metadata, patches))
                } else {
                    Err(JLAPError::NoPatchesFoundError)
                }
            }
            Err(error) => Err(error),
        }
    } else {
        Err(JLAPError::NoPatchesFoundError)
    }
}

/// Applies JLAP patches to a `repodata.json` file
///
/// This is a multi-step process that involves:
///
/// 1. Opening and parsing the current repodata file
/// 2. Applying patches to this repodata file
/// 3. Saving this repodata file to disk
/// 4. Generating a new `blake2b` hash
///
/// The return value is the `blake2b` hash we used to verify the updated file's contents.
pub async fn apply_jlap_patches(
    patches: &Vec<&Patch>,
    repo_data_path: &Path,
) -> Result<Output<Blake2b256>, JLAPError> {
    // Open and read the current repodata into a JSON doc
    let repo_data_contents = match tokio::fs::read_to_string(repo_data_path).await {
        Ok(contents) => contents,
        Err(error) => return Err(JLAPError::FileSystemError(error)),
    };

    let mut doc = match serde_json::from_str(&repo_data_contents) {
        Ok(doc) => doc,
        Err(error) => return Err(JLAPError::JSONParseError(error)),
    };

    // Apply the patches we current have to it
    for patch in patches {
        match json_patch::patch(&mut doc, &patch.patch) {
            Ok(_) => (),
            Err(error) => return Err(JLAPError::JSONPatchError(error)),
        }
    }

    // Save the updated repodata JSON doc
    let mut updated_file = match tokio::fs::File::create(repo_data_path).await {
        Ok(file) => file,
        Err(error) => return Err(JLAPError::FileSystemError(error)),
    };

    let mut updated_json = match serde_json::to_string_pretty(&doc) {
        Ok(value) => value,
        Err(error) => return Err(JLAPError::JSONParseError(error)),
    };

    // We need to add an extra newline character to the end of our string so the hashes match ðŸ¤·â€
    updated_json.insert(updated_json.len(), '\n');
    let content = updated_json.into_bytes();

    match updated_file.write_all(&content).await {
        Ok(_) => Ok(compute_bytes_digest::<Blake2b256>(content)),
        Err(error) => Err(JLAPError::FileSystemError(error)),
    }
}

/// Finds the index of the of the most applicable patch to use
fn find_current_patch_index(patches: &[Patch], hash: Output<Blake2b256>) -> Option<usize> {
    for (idx, patch) in patches.iter().enumerate() {
        if hash == patch.from.unwrap_or_default() {
            return Some(idx);
        }
    }

    None
}

/// Finds the initial vector in the JLAP response; this is the first line of a full request
fn get_initial_vector(jlap_response: &str) -> Option<String> {
    let parts: Vec<&str> = jlap_response.split('\n').collect();

    if !parts.is_empty() {
        Some(parts[0].to_string())
    } else {
        None
    }
}
