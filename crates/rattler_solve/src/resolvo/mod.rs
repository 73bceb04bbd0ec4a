//! Provides a solver implementation based on the [`resolvo`] crate.

use crate::{
    ChannelPriority, MinimumAgeConfig, SolveError, SolveStrategy, SolverRepoData, SolverResult,
    SolverTask,
};
use rattler_conda_types::package::ArchiveType;
use rattler_conda_types::{
    split_legacy_conditional_dependency, GenericVirtualPackage, MatchSpec, MatchSpecCondition,
    Matches, NamelessMatchSpec, PackageRecord, ParseMatchSpecError, ParseMatchSpecOptions,
    RepoDataRecord, Version,
};
use resolvo::{
    Candidates, Dependencies, DependencyProvider, NameId, Pool, SolvableDisplay, SolvableId,
    Solver as LibSolvRsSolver, SolverCache, VersionSet, VersionSetId,
};
use std::{
    cell::RefCell,
    cmp::Ordering,
    collections::{HashMap, HashSet},
    fmt::{Display, Formatter},
    marker::PhantomData,
    ops::Deref,
    str::FromStr,
};

use itertools::Itertools;

mod conda_util;

/// Represents the information required to load available packages into the solver for a
/// single channel and platform combination.
#[derive(Clone)]
pub struct RepoData<'a> {
    /// The actual records after parsing `repodata.json`.
    pub records: Vec<&'a RepoDataRecord>,
}

impl<'a> FromIterator<&'a RepoDataRecord> for RepoData<'a> {
    fn from_iter<T: IntoIterator<Item = &'a RepoDataRecord>>(iter: T) -> Self {
        Self {
            records: Vec::from_iter(iter),
        }
    }
}

impl<'a> SolverRepoData<'a> for RepoData<'a> {}

/// Wrapper around `NamelessMatchSpec` so that we can use it in the `resolvo` pool.
#[repr(transparent)]
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct SolverMatchSpec<'a> {
    inner: NamelessMatchSpec,
    _marker: PhantomData<&'a PackageRecord>,
}

impl<'a> From<NamelessMatchSpec> for SolverMatchSpec<'a> {
    fn from(value: NamelessMatchSpec) -> Self {
        Self {
            inner: value,
            _marker: PhantomData,
        }
    }
}

impl<'a> Display for SolverMatchSpec<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl<'a> Deref for SolverMatchSpec<'a> {
    type Target = NamelessMatchSpec;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<'a> VersionSet for SolverMatchSpec<'a> {
    type V = SolverPackageRecord<'a>;

    fn contains(&self, v: &Self::V) -> bool {
        match v {
            SolverPackageRecord::Record(rec) => self.inner.matches(&rec.package_record),
            SolverPackageRecord::VirtualPackage(GenericVirtualPackage {
                version,
                build_string,
                ..
            }) => {
                if let Some(spec) = self.inner.version.as_ref() {
                    if !spec.matches(version) {
                        return false;
                    }
                }

                if let Some(build_match) = self.inner.build.as_ref() {
                    if !build_match.matches(build_string) {
                        return false;
                    }
                }

                true
            }
            // The root marker is only ever targeted by the internally constructed root
            // requirement that always resolves to it.
            SolverPackageRecord::Root => true,
        }
    }
}

/// Wrapper around [`PackageRecord`] so that we can use it in the resolvo pool.
///
/// `Root` is a synthetic solvable, internal to this module, that exists solely to carry the
/// task-level [`SolverTask::constraints`] into the solve: it is always part of the solution
/// (it's the target of an always-true root requirement) and its `constrains` propagate the
/// global constraints onto whichever package they name, without forcing those packages to be
/// installed.
#[derive(Ord, PartialOrd, Eq, PartialEq)]
enum SolverPackageRecord<'a> {
    Record(&'a RepoDataRecord),
    VirtualPackage(&'a GenericVirtualPackage),
    Root,
}

fn root_version() -> &'static Version {
    static VERSION: std::sync::OnceLock<Version> = std::sync::OnceLock::new();
    VERSION.get_or_init(|| Version::from_str("0").unwrap())
}

impl<'a> SolverPackageRecord<'a> {
    fn version(&self) -> &Version {
        match self {
            SolverPackageRecord::Record(rec) => rec.package_record.version.version(),
            SolverPackageRecord::VirtualPackage(rec) => &rec.version,
            SolverPackageRecord::Root => root_version(),
        }
    }

    fn track_features(&self) -> &[String] {
        const EMPTY: [String; 0] = [];
        match self {
            SolverPackageRecord::Record(rec) => &rec.package_record.track_features,
            SolverPackageRecord::VirtualPackage(_) | SolverPackageRecord::Root => &EMPTY,
        }
    }

    fn build_number(&self) -> u64 {
        match self {
            SolverPackageRecord::Record(rec) => rec.package_record.build_number,
            SolverPackageRecord::VirtualPackage(_) | SolverPackageRecord::Root => 0,
        }
    }

    fn timestamp(&self) -> Option<&chrono::DateTime<chrono::Utc>> {
        match self {
            SolverPackageRecord::Record(rec) => rec.package_record.timestamp.as_ref(),
            SolverPackageRecord::VirtualPackage(_) | SolverPackageRecord::Root => None,
        }
    }
}

impl<'a> Display for SolverPackageRecord<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverPackageRecord::Record(rec) => write!(f, "{}", &rec.package_record),
            SolverPackageRecord::VirtualPackage(rec) => write!(f, "{} {}", rec.name, rec.version),
            SolverPackageRecord::Root => write!(f, "<root>"),
        }
    }
}

/// The known version/build of a package, used to evaluate conditional dependencies
/// (`"dep; if cond"`). A fact is only recorded for a package name when it can be pinned down
/// unambiguously: virtual packages always qualify, root specs qualify only when they match
/// exactly one available candidate. This is a simplification of full transitive conditional
/// resolution; see `DESIGN.md`.
type ConditionFacts = HashMap<String, (Version, String)>;

fn condition_is_satisfied(spec: &MatchSpec, facts: &ConditionFacts) -> bool {
    let Some((version, build)) = facts.get(&spec.name.to_string()) else {
        return false;
    };

    if let Some(version_spec) = &spec.version {
        if !version_spec.matches(version) {
            return false;
        }
    }

    if let Some(build_matcher) = &spec.build {
        if !build_matcher.matches(build) {
            return false;
        }
    }

    true
}

/// Dependency provider for conda.
pub(crate) struct CondaDependencyProvider<'a> {
    pool: Pool<SolverMatchSpec<'a>, String>,

    records: HashMap<NameId, Candidates>,

    matchspec_to_highest_version: RefCell<HashMap<VersionSetId, Option<(Version, bool)>>>,

    parse_match_spec_cache: RefCell<HashMap<&'a str, (VersionSetId, Option<MatchSpecCondition>)>>,

    /// Version sets interned for `SolverTask::constraints`, carried by the synthetic root
    /// solvable's `Dependencies::constrains`.
    root_constrains: Vec<VersionSetId>,

    /// Facts used to evaluate legacy conditional dependency strings.
    condition_facts: ConditionFacts,

    /// Names that were requested directly (as opposed to pulled in transitively), used to
    /// implement [`SolveStrategy::LowestVersionDirect`].
    direct_names: HashSet<NameId>,

    strategy: SolveStrategy,
}

impl<'a> CondaDependencyProvider<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn from_solver_task(
        repodata: impl IntoIterator<Item = RepoData<'a>>,
        locked_records: &'a [RepoDataRecord],
        pinned_records: &'a [RepoDataRecord],
        virtual_packages: &'a [GenericVirtualPackage],
        exclude_newer: Option<chrono::DateTime<chrono::Utc>>,
        min_age: Option<&MinimumAgeConfig>,
        channel_priority: ChannelPriority,
    ) -> Result<Self, SolveError> {
        let pool = Pool::default();
        let mut records: HashMap<NameId, Candidates> = HashMap::default();
        let mut duplicates = Vec::new();

        // Add virtual packages to the records
        for virtual_package in virtual_packages {
            let name = pool.intern_package_name(&virtual_package.name);
            let solvable =
                pool.intern_solvable(name, SolverPackageRecord::VirtualPackage(virtual_package));
            records.entry(name).or_default().candidates.push(solvable);
        }

        // Tracks which channel (by index into `repodata`) first provided candidates for a
        // given package name, used to implement `ChannelPriority::Strict`.
        let mut name_channel: HashMap<NameId, usize> = HashMap::new();

        for (channel_idx, repo_datas) in repodata.into_iter().enumerate() {
            // Iterate over all records and dedup records that refer to the same package data
            // but with different archive types. This can happen if you have two variants of
            // the same package but with different extensions. We prefer `.conda` packages
            // over `.tar.bz2`.
            //
            // It's important to insert the records in the same order as how they were
            // presented to this function to ensure that each solve is deterministic.
            let mut ordered_repodata = Vec::with_capacity(repo_datas.records.len());
            let mut package_to_type: HashMap<&str, (ArchiveType, usize)> =
                HashMap::with_capacity(repo_datas.records.len());

            for record in repo_datas.records {
                if !passes_age_filters(&record.package_record, exclude_newer, min_age) {
                    continue;
                }

                let (file_name, archive_type) = ArchiveType::split_str(&record.file_name)
                    .unwrap_or((&record.file_name, ArchiveType::TarBz2));
                match package_to_type.get_mut(file_name) {
                    None => {
                        let idx = ordered_repodata.len();
                        ordered_repodata.push(record);
                        package_to_type.insert(file_name, (archive_type, idx));
                    }
                    Some((prev_archive_type, idx)) => match archive_type.cmp(prev_archive_type) {
                        Ordering::Greater => {
                            // A previous package has a worse package "type", we'll use the
                            // current record instead.
                            *prev_archive_type = archive_type;
                            ordered_repodata[*idx] = record;
                        }
                        Ordering::Less => {
                            // A previous package that we already stored is actually a package
                            // of a better "type" so we'll just use that instead (.conda >
                            // .tar.bz)
                        }
                        Ordering::Equal => {
                            if record != ordered_repodata[*idx] {
                                duplicates.push(record.file_name.clone());
                            }
                        }
                    },
                }
            }

            for record in ordered_repodata {
                let package_name =
                    pool.intern_package_name(record.package_record.name.as_normalized());

                if channel_priority == ChannelPriority::Strict {
                    match name_channel.get(&package_name) {
                        Some(&owner) if owner != channel_idx => continue,
                        _ => {
                            name_channel.entry(package_name).or_insert(channel_idx);
                        }
                    }
                }

                let solvable_id =
                    pool.intern_solvable(package_name, SolverPackageRecord::Record(record));
                let candidates = records.entry(package_name).or_default();
                candidates.candidates.push(solvable_id);
                candidates.hint_dependencies_available.push(solvable_id);
            }
        }

        if !duplicates.is_empty() {
            return Err(SolveError::DuplicateRecords(duplicates));
        }

        // Locked packages (previously selected, preferred but changeable).
        for locked_record in locked_records {
            let name =
                pool.intern_package_name(locked_record.package_record.name.as_normalized());
            let solvable = pool.intern_solvable(name, SolverPackageRecord::Record(locked_record));
            let candidates = records.entry(name).or_default();
            candidates.candidates.push(solvable);
            candidates.favored = Some(solvable);
        }

        // Pinned packages (previously selected, cannot be changed).
        for pinned_record in pinned_records {
            let name =
                pool.intern_package_name(pinned_record.package_record.name.as_normalized());
            let solvable = pool.intern_solvable(name, SolverPackageRecord::Record(pinned_record));
            let candidates = records.entry(name).or_default();
            candidates.candidates.push(solvable);
            candidates.locked = Some(solvable);
        }

        Ok(Self {
            pool,
            records,
            matchspec_to_highest_version: RefCell::default(),
            parse_match_spec_cache: RefCell::default(),
            root_constrains: Vec::new(),
            condition_facts: ConditionFacts::new(),
            direct_names: HashSet::new(),
            strategy: SolveStrategy::default(),
        })
    }

    /// Finds the existing records known for a package name, if any.
    fn records_for_name(&self, name: NameId) -> impl Iterator<Item = &'a RepoDataRecord> + '_ {
        self.records
            .get(&name)
            .into_iter()
            .flat_map(|candidates| candidates.candidates.iter())
            .filter_map(move |&id| match self.pool.resolve_solvable(id).inner() {
                SolverPackageRecord::Record(rec) => Some(*rec),
                _ => None,
            })
    }

    /// Interns a [`MatchSpec`] as a root-level version set, without using the depends-string
    /// cache (which is keyed on borrowed repodata strings and not suited for the handful of
    /// task-level specs/constraints/soft requirements solved per task).
    fn intern_root_spec(&self, spec: &MatchSpec) -> Result<VersionSetId, SolveError> {
        let (name, nameless) = spec.clone().into_nameless();
        let name = name.ok_or_else(|| {
            SolveError::Unsolvable(vec![format!(
                "match spec '{spec}' without a name cannot be used as a root requirement"
            )])
        })?;
        let name_id = self.pool.intern_package_name(name.as_normalized());
        Ok(self.pool.intern_version_set(name_id, nameless.into()))
    }
}

impl<'a> DependencyProvider<SolverMatchSpec<'a>> for CondaDependencyProvider<'a> {
    fn pool(&self) -> &Pool<SolverMatchSpec<'a>, String> {
        &self.pool
    }

    fn sort_candidates(
        &self,
        solver: &SolverCache<SolverMatchSpec<'a>, String, Self>,
        solvables: &mut [SolvableId],
    ) {
        let reverse = match self.strategy {
            SolveStrategy::Highest => false,
            SolveStrategy::LowestVersion => true,
            SolveStrategy::LowestVersionDirect => solvables.first().is_some_and(|&id| {
                let name = self.pool.resolve_solvable(id).name;
                self.direct_names.contains(&name)
            }),
        };

        let mut highest_version_spec = self.matchspec_to_highest_version.borrow_mut();
        solvables.sort_by(|&p1, &p2| {
            conda_util::compare_candidates(p1, p2, solver, &mut highest_version_spec, reverse)
        });
    }

    fn get_candidates(&self, name: NameId) -> Option<Candidates> {
        self.records.get(&name).cloned()
    }

    fn get_dependencies(&self, solvable: SolvableId) -> Dependencies {
        match self.pool.resolve_solvable(solvable).inner() {
            SolverPackageRecord::Record(rec) => {
                let mut parse_match_spec_cache = self.parse_match_spec_cache.borrow_mut();
                let mut dependencies = Dependencies {
                    requirements: Vec::new(),
                    constrains: Vec::new(),
                };

                for depends in &rec.package_record.depends {
                    let (spec_str, condition) = split_legacy_conditional_dependency(depends);
                    if let Some(condition) = &condition {
                        if !condition
                            .evaluate(&|spec| condition_is_satisfied(spec, &self.condition_facts))
                        {
                            continue;
                        }
                    }

                    let Ok((version_set_id, bracket_condition)) =
                        parse_match_spec(&self.pool, spec_str, &mut parse_match_spec_cache)
                    else {
                        continue;
                    };
                    if let Some(condition) = &bracket_condition {
                        if !condition
                            .evaluate(&|spec| condition_is_satisfied(spec, &self.condition_facts))
                        {
                            continue;
                        }
                    }
                    dependencies.requirements.push(version_set_id);
                }

                for constrains in &rec.package_record.constrains {
                    let (spec_str, _condition) = split_legacy_conditional_dependency(constrains);
                    if let Ok((version_set_id, _bracket_condition)) =
                        parse_match_spec(&self.pool, spec_str, &mut parse_match_spec_cache)
                    {
                        dependencies.constrains.push(version_set_id);
                    }
                }

                dependencies
            }
            SolverPackageRecord::VirtualPackage(_) => Dependencies {
                requirements: Vec::new(),
                constrains: Vec::new(),
            },
            SolverPackageRecord::Root => Dependencies {
                requirements: Vec::new(),
                constrains: self.root_constrains.clone(),
            },
        }
    }
}

fn passes_age_filters(
    record: &PackageRecord,
    exclude_newer: Option<chrono::DateTime<chrono::Utc>>,
    min_age: Option<&MinimumAgeConfig>,
) -> bool {
    if let Some(cutoff) = exclude_newer {
        if let Some(timestamp) = record.timestamp {
            if timestamp > cutoff {
                return false;
            }
        }
    }

    if let Some(config) = min_age {
        if config.is_exempt(&record.name) {
            return true;
        }

        match record.timestamp {
            Some(timestamp) => {
                if let Some(cutoff) = config.cutoff() {
                    if timestamp > cutoff {
                        return false;
                    }
                }
            }
            None => {
                if !config.include_unknown_timestamp() {
                    return false;
                }
            }
        }
    }

    true
}

/// Displays the different candidates by their version and sorted by their version.
pub struct CondaSolvableDisplay;

impl SolvableDisplay<SolverMatchSpec<'_>> for CondaSolvableDisplay {
    fn display_candidates(
        &self,
        pool: &Pool<SolverMatchSpec, String>,
        merged_candidates: &[SolvableId],
    ) -> String {
        merged_candidates
            .iter()
            .map(|&id| pool.resolve_solvable(id).inner().version())
            .sorted()
            .map(|s| s.to_string())
            .join(" | ")
    }
}

/// A [`super::SolverImpl`] implemented using the `resolvo` library.
#[derive(Default)]
pub struct Solver;

impl super::SolverImpl for Solver {
    type RepoData<'a> = RepoData<'a>;

    fn solve<
        'a,
        R: Into<Self::RepoData<'a>>,
        TAvailablePackagesIterator: IntoIterator<Item = R>,
    >(
        &mut self,
        task: SolverTask<TAvailablePackagesIterator>,
    ) -> Result<SolverResult, SolveError> {
        if task.timeout.is_some() {
            return Err(SolveError::UnsupportedOperations(vec![
                "timeout".to_string(),
            ]));
        }

        let repo_data: Vec<RepoData<'a>> = task
            .available_packages
            .into_iter()
            .map(Into::into)
            .collect();

        let attempt = |include_soft_requirements: bool| -> Result<Vec<RepoDataRecord>, SolveError> {
            let mut provider = CondaDependencyProvider::from_solver_task(
                repo_data.iter().cloned(),
                &task.locked_packages,
                &task.pinned_packages,
                &task.virtual_packages,
                task.exclude_newer,
                task.min_age.as_ref(),
                task.channel_priority,
            )?;
            provider.strategy = task.strategy;

            // Seed the condition facts with virtual packages (always known) and any root spec
            // that unambiguously identifies a single available candidate.
            let mut condition_facts: ConditionFacts = task
                .virtual_packages
                .iter()
                .map(|vp| (vp.name.clone(), (vp.version.clone(), vp.build_string.clone())))
                .collect();
            let mut direct_names = HashSet::new();
            let mut root_requirements = Vec::new();

            for spec in &task.specs {
                let name_str = spec.name.to_string();
                let name_id = provider.pool.intern_package_name(&name_str);
                direct_names.insert(name_id);

                let matching: Vec<&RepoDataRecord> = provider
                    .records_for_name(name_id)
                    .filter(|rec| spec.matches(&rec.package_record))
                    .collect();

                if let [rec] = matching.as_slice() {
                    condition_facts.insert(
                        rec.package_record.name.as_normalized().to_string(),
                        (
                            rec.package_record.version.version().clone(),
                            rec.package_record.build.clone(),
                        ),
                    );
                }

                if let (Some(extras), [rec]) = (&spec.extras, matching.as_slice()) {
                    let mut cache = provider.parse_match_spec_cache.borrow_mut();
                    for extra in extras {
                        let Some(extra_depends) = rec.package_record.experimental_extra_depends.get(extra)
                        else {
                            continue;
                        };
                        for dep in extra_depends {
                            if let Ok((version_set_id, bracket_condition)) =
                                parse_match_spec(&provider.pool, dep.as_str(), &mut cache)
                            {
                                if let Some(condition) = &bracket_condition {
                                    if !condition.evaluate(&|spec| {
                                        condition_is_satisfied(spec, &condition_facts)
                                    }) {
                                        continue;
                                    }
                                }
                                root_requirements.push(version_set_id);
                            }
                        }
                    }
                }

                root_requirements.push(provider.intern_root_spec(spec)?);
            }

            provider.condition_facts = condition_facts;
            provider.direct_names = direct_names;

            // Task-level constraints are carried by a synthetic "root" solvable that is
            // always installed: its `constrains` restrict whichever package they name,
            // without forcing that package to be installed.
            if !task.constraints.is_empty() {
                let mut constrains = Vec::with_capacity(task.constraints.len());
                for constraint in &task.constraints {
                    constrains.push(provider.intern_root_spec(constraint)?);
                }

                let root_name = provider.pool.intern_package_name("$root$");
                let root_solvable = provider
                    .pool
                    .intern_solvable(root_name, SolverPackageRecord::Root);
                provider
                    .records
                    .entry(root_name)
                    .or_default()
                    .candidates
                    .push(root_solvable);
                provider.root_constrains = constrains;

                let root_req = provider
                    .pool
                    .intern_version_set(root_name, NamelessMatchSpec::default().into());
                root_requirements.push(root_req);
            }

            if include_soft_requirements {
                for soft_spec in &task.soft_requirements {
                    root_requirements.push(provider.intern_root_spec(soft_spec)?);
                }
            }

            let mut solver = LibSolvRsSolver::new(provider);
            let solvables = solver.solve(root_requirements).map_err(|problem| {
                SolveError::Unsolvable(vec![problem
                    .display_user_friendly(&solver, &CondaSolvableDisplay)
                    .to_string()])
            })?;

            Ok(solvables
                .into_iter()
                .filter_map(|id| match solver.pool().resolve_solvable(id).inner() {
                    SolverPackageRecord::Record(rec) => Some(rec.deref().clone()),
                    SolverPackageRecord::VirtualPackage(_) | SolverPackageRecord::Root => None,
                })
                .collect())
        };

        let records = if task.soft_requirements.is_empty() {
            attempt(false)?
        } else {
            match attempt(true) {
                Ok(records) => records,
                Err(_) => attempt(false)?,
            }
        };

        Ok(SolverResult { records })
    }
}

/// Options used when parsing the individual `depends`/`constrains` entries of a
/// [`PackageRecord`]: the still-experimental `extras` and `when` bracket keys are
/// recognized since repodata may legitimately contain either.
fn depends_string_parse_options() -> ParseMatchSpecOptions {
    ParseMatchSpecOptions::default()
        .with_experimental_extras(true)
        .with_experimental_conditionals(true)
}

fn parse_match_spec<'a>(
    pool: &Pool<SolverMatchSpec<'a>, String>,
    spec_str: &'a str,
    parse_match_spec_cache: &mut HashMap<&'a str, (VersionSetId, Option<MatchSpecCondition>)>,
) -> Result<(VersionSetId, Option<MatchSpecCondition>), ParseMatchSpecError> {
    Ok(match parse_match_spec_cache.get(spec_str) {
        Some(entry) => entry.clone(),
        None => {
            let match_spec = MatchSpec::from_str(spec_str, depends_string_parse_options())?;
            let condition = match_spec.condition.clone();
            let (name, spec) = match_spec.into_nameless();
            let dependency_name = pool.intern_package_name(
                name.as_ref()
                    .expect("match specs without names are not supported")
                    .as_normalized(),
            );
            let version_set_id = pool.intern_version_set(dependency_name, spec.into());
            let entry = (version_set_id, condition);
            parse_match_spec_cache.insert(spec_str, entry.clone());
            entry
        }
    })
}
