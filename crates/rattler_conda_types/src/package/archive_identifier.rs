use super::ArchiveType;
use itertools::Itertools;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;
use url::Url;

/// A package archive identifier contains the `name`, `version` and `build_string` of a Conda
/// package archive, without committing to a specific archive type. This information can be
/// derived from the filename of a package archive using the
/// [`ArchiveIdentifier::try_from_filename`] and [`ArchiveIdentifier::try_from_url`] functions.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ArchiveIdentifier {
    /// The name of the package.
    pub name: String,
    /// The version of the package.
    pub version: String,
    /// The build string of the package.
    pub build_string: String,
}

impl ArchiveIdentifier {
    /// Tries to convert the specified filename into an [`ArchiveIdentifier`].
    pub fn try_from_filename(filename: &str) -> Option<Self> {
        CondaArchiveIdentifier::try_from_filename(filename).map(Into::into)
    }

    /// Tries to convert the specified path into an [`ArchiveIdentifier`].
    pub fn try_from_path(path: impl AsRef<Path>) -> Option<Self> {
        CondaArchiveIdentifier::try_from_path(path).map(Into::into)
    }

    /// Tries to convert a [`Url`] into an [`ArchiveIdentifier`].
    pub fn try_from_url(url: &Url) -> Option<Self> {
        CondaArchiveIdentifier::try_from_url(url).map(Into::into)
    }
}

impl From<CondaArchiveIdentifier> for ArchiveIdentifier {
    fn from(value: CondaArchiveIdentifier) -> Self {
        Self {
            name: value.name,
            version: value.version,
            build_string: value.build_string,
        }
    }
}

impl FromStr for ArchiveIdentifier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from_filename(s).ok_or(())
    }
}

impl Display for ArchiveIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", &self.name, &self.version, &self.build_string)
    }
}

/// A package archive identifier contains the `name`, `version`, `build_string` and `archive_type`
/// of a package archive. This information can be derived from the filename of a package archive using
/// the [`CondaArchiveIdentifier::try_from_filename`] and [`CondaArchiveIdentifier::try_from_url`] functions.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct CondaArchiveIdentifier {
    /// The name of the package.
    pub name: String,
    /// The version of the package.
    pub version: String,
    /// The build string of the package.
    pub build_string: String,
    /// The archive type of the package (tar.bz2, conda or whl)
    pub archive_type: ArchiveType,
}

impl CondaArchiveIdentifier {
    /// Converts the archive identifier into a filename for a Conda package.
    pub fn to_file_name(&self) -> String {
        self.to_string()
    }

    /// Tries to convert the specified filename into an [`CondaArchiveIdentifier`].
    ///
    /// Since Conda archives have a format for file names (see [`Self::to_file_name`]) we can
    /// reverse engineer the information that went into it. This function tries to do just that.
    pub fn try_from_filename(filename: &str) -> Option<Self> {
        // Strip the suffix from the filename
        let (filename_without_ext, archive_type) = ArchiveType::split_str(filename)?;

        let version;
        let name;
        let build_string;

        if archive_type == ArchiveType::Whl {
            // Filename is in the form of: {distribution}-{version}(-{build tag})?-{python tag}-{abi tag}-{platform tag}
            // Build string is intentionally ignored
            (name, version) = filename_without_ext.split('-').next_tuple()?;
            build_string = "0";
        } else {
            // Filename is in the form of: <name>-<version>-<build>
            (build_string, version, name) = filename_without_ext.rsplitn(3, '-').next_tuple()?;
        }

        Some(Self {
            name: name.to_owned(),
            version: version.to_owned(),
            build_string: build_string.to_owned(),
            archive_type,
        })
    }

    /// Tries to convert the specified path into an [`CondaArchiveIdentifier`].
    ///
    /// Since Conda archives have a format for file names (see [`Self::to_file_name`]) we can
    /// reverse engineer the information that went into it. This function tries to do just that.
    pub fn try_from_path(path: impl AsRef<Path>) -> Option<Self> {
        Self::try_from_filename(path.as_ref().file_name()?.to_str()?)
    }

    /// Tries to convert a [`Url`] into an [`CondaArchiveIdentifier`].
    ///
    /// Since Conda archives have a format for file names (see [`Self::to_file_name`]) we can
    /// reverse engineer the information that went into it. This function tries to do just that.
    pub fn try_from_url(url: &Url) -> Option<Self> {
        let filename = url.path_segments().and_then(Iterator::last)?;
        Self::try_from_filename(filename)
    }
}

impl Display for CondaArchiveIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}-{}{}",
            &self.name,
            &self.version,
            &self.build_string,
            self.archive_type.extension()
        )
    }
}

/// A package archive identifier contains the `name`, `version`, `build_string` and `archive_type`
/// of a package archive. This information can be derived from the filename of a package archive using
/// the [`WheelArchiveIdentifier::try_from_filename`] and [`WheelArchiveIdentifier::try_from_url`] functions.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct WheelArchiveIdentifier {
    /// The name of the package.
    pub name: String,
    /// The version of the package.
    pub version: String,
    /// The build string of the package.
    pub build_string: String,
    /// The distribution of the package.
    pub distribution: String,
    /// The build tag of the package
    pub build_tag: String,
    /// The python tag of the package
    pub python_tag: String,
    /// The ABI tag of the package
    pub abi_tag: String,
    /// The platform tag of the package
    pub platform_tag: String,
    /// The archive type of the package (tar.bz2, conda or whl)
    pub archive_type: ArchiveType,
}

impl WheelArchiveIdentifier {
    /// Converts the archive identifier into a filename for a Wheel package.
    pub fn to_file_name(&self) -> String {
        self.to_string()
    }

    /// Tries to convert the specified filename into an [`WheelArchiveIdentifier`].
    ///
    /// Since Conda archives have a format for file names (see [`Self::to_file_name`]) we can
    /// reverse engineer the information that went into it. This function tries to do just that.
    pub fn try_from_filename(filename: &str) -> Option<Self> {
        // Strip the suffix from the filename
        let (filename_without_ext, archive_type) = ArchiveType::split_str(filename)?;

        let name;
        let version;
        let build_string = "py0";
        let distribution;
        let mut build_tag = "";
        let python_tag;
        let abi_tag;
        let platform_tag;

        let parts = filename_without_ext.split('-').collect_vec();

        // If a build tag is present
        if parts.len() > 5 {
            name = parts[0];
            distribution = parts[0];
            version = parts[1];
            build_tag = parts[2];
            python_tag = parts[3];
            abi_tag = parts[4];
            platform_tag = parts[5];
        } else {
            name = parts[0];
            distribution = parts[0];
            version = parts[1];
            python_tag = parts[2];
            abi_tag = parts[3];
            platform_tag = parts[4];
        }


        Some(Self {
            name: name.to_owned(),
            version: version.to_owned(),
            build_string: build_string.to_owned(),
            distribution: distribution.to_owned(),
            build_tag: build_tag.to_owned(),
            python_tag: python_tag.to_owned(),
            abi_tag: abi_tag.to_owned(),
            platform_tag: platform_tag.to_owned(),
            archive_type,
        })
    }

    /// Tries to convert the specified path into an [`WheelArchiveIdentifier`].
    ///
    /// Since Conda archives have a format for file names (see [`Self::to_file_name`]) we can
    /// reverse engineer the information that went into it. This function tries to do just that.
    pub fn try_from_path(path: impl AsRef<Path>) -> Option<Self> {
        Self::try_from_filename(path.as_ref().file_name()?.to_str()?)
    }

    /// Tries to convert a [`Url`] into an [`WheelArchiveIdentifier`].
    ///
    /// Since Conda archives have a format for file names (see [`Self::to_file_name`]) we can
    /// reverse engineer the information that went into it. This function tries to do just that.
    pub fn try_from_url(url: &Url) -> Option<Self> {
        let filename = url.path_segments().and_then(Iterator::last)?;
        Self::try_from_filename(filename)
    }
}

impl Display for WheelArchiveIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // Filename is in the form of: {distribution}-{version}(-{build tag})?-{python tag}-{abi tag}-{platform tag}
        if self.build_tag.is_empty() {
            write!(
                f,
                "{}-{}-{}-{}-{}{}",
                &self.distribution,
                &self.version,
                &self.python_tag,
                &self.abi_tag,
                &self.platform_tag,
                &self.archive_type.extension()
            )
        } else {
            write!(
                f,
                "{}-{}-{}-{}-{}-{}{}",
                &self.distribution,
                &self.version,
                &self.build_tag,
                &self.python_tag,
                &self.abi_tag,
                &self.platform_tag,
                &self.archive_type.extension()
            )
        }
    }
}
/// Identifies either a conda package archive or a wheel archive by its filename, without
/// requiring the caller to know ahead of time which kind of archive it is.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum DistArchiveIdentifier {
    /// The archive is a conda package (`.tar.bz2` or `.conda`).
    Conda(CondaArchiveIdentifier),
    /// The archive is a Python wheel (`.whl`).
    Wheel(WheelArchiveIdentifier),
}

impl DistArchiveIdentifier {
    /// Tries to convert the specified filename into a [`DistArchiveIdentifier`].
    pub fn try_from_filename(filename: &str) -> Option<Self> {
        match ArchiveType::try_from(filename)? {
            ArchiveType::Conda(_) => {
                CondaArchiveIdentifier::try_from_filename(filename).map(Self::Conda)
            }
            ArchiveType::Dist(_) => {
                WheelArchiveIdentifier::try_from_filename(filename).map(Self::Wheel)
            }
        }
    }
}

impl Display for DistArchiveIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DistArchiveIdentifier::Conda(id) => Display::fmt(id, f),
            DistArchiveIdentifier::Wheel(id) => Display::fmt(id, f),
        }
    }
}

impl FromStr for DistArchiveIdentifier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from_filename(s).ok_or(())
    }
}

impl From<DistArchiveIdentifier> for String {
    fn from(value: DistArchiveIdentifier) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for DistArchiveIdentifier {
    type Error = ();

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl serde::Serialize for DistArchiveIdentifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for DistArchiveIdentifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(|()| {
            serde::de::Error::custom(format!("invalid archive identifier filename: {s}"))
        })
    }
}
