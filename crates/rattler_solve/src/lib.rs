#![deny(missing_docs)]

//! `rattler_solve` is a crate that provides functionality to solve Conda environments. It
//! currently exposes the functionality through the [`SolverImpl::solve`] function.

pub mod resolvo;

use std::time::Duration;

use chrono::{DateTime, Utc};
use rattler_conda_types::{GenericVirtualPackage, MatchSpec, PackageName, RepoDataRecord};

/// Represents an error when solving the dependencies for a given environment
#[derive(thiserror::Error, Debug)]
pub enum SolveError {
    /// There is no set of dependencies that satisfies the requirements
    #[error("Cannot solve the request because of: {}", .0.join(", "))]
    Unsolvable(Vec<String>),

    /// The solver backend returned operations that we dont know how to install.
    /// Each string is a somewhat user-friendly representation of which operation was not
    /// recognized and can be used for error reporting
    #[error("Unsupported operations: {}", .0.join(", "))]
    UnsupportedOperations(Vec<String>),

    /// The available packages contained multiple, different, records that refer to the same
    /// package archive. Each string identifies one of the conflicting archives.
    #[error("Encountered duplicate records for: {}", .0.join(", "))]
    DuplicateRecords(Vec<String>),
}

/// Controls how packages originating from different channels are ranked against each other.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ChannelPriority {
    /// Packages from the first channel that provides any candidate for a given package name
    /// are preferred over packages from subsequent channels, regardless of version.
    #[default]
    Strict,
    /// All channels are considered equally; only version (and the other usual ordering
    /// criteria) decide which candidate is selected.
    Disabled,
}

/// Controls which version of a package the solver prefers when multiple versions satisfy the
/// requirements.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SolveStrategy {
    /// Prefer the highest possible version of every package. This is the default conda
    /// behavior.
    #[default]
    Highest,
    /// Prefer the lowest possible version, for both direct and transitive requirements.
    LowestVersion,
    /// Prefer the lowest possible version only for packages that are requested directly;
    /// transitive dependencies still prefer the highest compatible version.
    LowestVersionDirect,
}

/// Configures the "minimum package age" policy: packages published more recently than
/// `min_age` are treated as unavailable, which limits exposure to a package that was only
/// just published and could be a supply-chain attack.
#[derive(Debug, Clone)]
pub struct MinimumAgeConfig {
    min_age: Duration,
    exempt_packages: Vec<PackageName>,
    include_unknown_timestamp: bool,
}

impl MinimumAgeConfig {
    /// Creates a new configuration that filters out candidates published less than `min_age`
    /// ago.
    pub fn new(min_age: Duration) -> Self {
        Self {
            min_age,
            exempt_packages: Vec::new(),
            include_unknown_timestamp: false,
        }
    }

    /// Exempts a package from the minimum-age filter, e.g. because it is built locally.
    #[must_use]
    pub fn with_exempt_package(mut self, name: PackageName) -> Self {
        self.exempt_packages.push(name);
        self
    }

    /// Controls whether candidates with an unknown (missing) timestamp are kept (`true`) or
    /// filtered out (`false`, the default) since their age cannot be verified.
    #[must_use]
    pub fn with_include_unknown_timestamp(mut self, include: bool) -> Self {
        self.include_unknown_timestamp = include;
        self
    }

    pub(crate) fn is_exempt(&self, name: &PackageName) -> bool {
        self.exempt_packages.iter().any(|exempt| exempt == name)
    }

    pub(crate) fn cutoff(&self) -> Option<DateTime<Utc>> {
        chrono::Duration::from_std(self.min_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
    }

    pub(crate) fn include_unknown_timestamp(&self) -> bool {
        self.include_unknown_timestamp
    }
}

/// Represents a dependency resolution task, to be solved by one of the backends (currently
/// only a pure-Rust `resolvo`-based backend is supported).
pub struct SolverTask<TAvailablePackagesIterator> {
    /// An iterator over all available packages.
    pub available_packages: TAvailablePackagesIterator,

    /// Records of packages that are previously selected.
    ///
    /// If the solver encounters multiple variants of a single package (identified by its
    /// name), it will sort the records and select the best possible version. However, if
    /// there exists a locked version it will prefer that variant instead. This is useful to
    /// reduce the number of packages that are updated when installing new packages.
    ///
    /// Usually you add the currently installed packages or packages from a lock-file here.
    pub locked_packages: Vec<RepoDataRecord>,

    /// Records of packages that are previously selected and CANNOT be changed.
    ///
    /// If the solver encounters multiple variants of a single package (identified by its
    /// name), it will sort the records and select the best possible version. However, if
    /// there is a variant available in the `pinned_packages` field it will always select that
    /// version no matter what, even if that means other packages have to be downgraded.
    pub pinned_packages: Vec<RepoDataRecord>,

    /// Virtual packages considered active.
    pub virtual_packages: Vec<GenericVirtualPackage>,

    /// The specs we want to solve.
    pub specs: Vec<MatchSpec>,

    /// Additional constraints that restrict which version of a package may be selected, but
    /// that don't by themselves cause the package to be installed.
    pub constraints: Vec<MatchSpec>,

    /// Specs that should be installed if they can be satisfied, but that must not cause the
    /// solve to fail when they can't be.
    pub soft_requirements: Vec<MatchSpec>,

    /// If set, packages newer than this timestamp are excluded from consideration entirely.
    pub exclude_newer: Option<DateTime<Utc>>,

    /// If set, applies the minimum-package-age policy to the available packages.
    pub min_age: Option<MinimumAgeConfig>,

    /// An optional time budget for the solve. Backends that cannot honor this should return
    /// [`SolveError::UnsupportedOperations`].
    pub timeout: Option<Duration>,

    /// How packages from different channels should be ranked against each other.
    pub channel_priority: ChannelPriority,

    /// How the solver should pick between multiple acceptable versions of a package.
    pub strategy: SolveStrategy,
}

impl<TAvailablePackagesIterator> SolverTask<TAvailablePackagesIterator> {
    /// Constructs a new task that considers the given available packages, with every other
    /// field set to its default (empty / disabled).
    pub fn from_iter(available_packages: TAvailablePackagesIterator) -> Self {
        Self {
            available_packages,
            locked_packages: Vec::new(),
            pinned_packages: Vec::new(),
            virtual_packages: Vec::new(),
            specs: Vec::new(),
            constraints: Vec::new(),
            soft_requirements: Vec::new(),
            exclude_newer: None,
            min_age: None,
            timeout: None,
            channel_priority: ChannelPriority::default(),
            strategy: SolveStrategy::default(),
        }
    }
}

/// The result of a successful solve.
#[derive(Debug, Clone, Default)]
pub struct SolverResult {
    /// The full set of records that must be present for the solve to be satisfied.
    pub records: Vec<RepoDataRecord>,
}

/// Data that a particular [`SolverImpl`] needs for a single channel/subdir combination. Every
/// backend can define its own representation, as long as it can be built from the repodata
/// records handed to it.
pub trait SolverRepoData<'a>: FromIterator<&'a RepoDataRecord> {}

/// A solver implementation capable of resolving a [`SolverTask`] into a [`SolverResult`].
pub trait SolverImpl {
    /// The repo data associated with a single channel/subdir that this implementation needs.
    type RepoData<'a>: SolverRepoData<'a>;

    /// Resolves the dependencies of the given task and returns the resulting set of packages.
    fn solve<'a, R, TAvailablePackagesIterator>(
        &mut self,
        task: SolverTask<TAvailablePackagesIterator>,
    ) -> Result<SolverResult, SolveError>
    where
        R: Into<Self::RepoData<'a>>,
        TAvailablePackagesIterator: IntoIterator<Item = R>;
}
