use std::str::FromStr;

use rattler_conda_types::{
    GenericVirtualPackage, MatchSpec, PackageRecord, ParseStrictness, RepoDataRecord, Version,
    VersionWithSource,
};
use rattler_solve::{SolveError, SolveStrategy, SolverImpl, SolverTask};
use url::Url;

mod conditional_tests;
mod extras_tests;
mod helpers;
mod min_age_tests;
mod soft_requirements_tests;
mod solver_case_tests;
mod strategy_tests;

pub(crate) fn dummy_md5_hash() -> rattler_digest::Md5Hash {
    rattler_digest::parse_digest_from_hex::<rattler_digest::Md5>("b3af409bb8423187c75e6c7f5b683908")
        .unwrap()
}

pub(crate) fn dummy_sha256_hash() -> rattler_digest::Sha256Hash {
    rattler_digest::parse_digest_from_hex::<rattler_digest::Sha256>(
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
    )
    .unwrap()
}

/// Packages whose repodata entry is malformed should be skipped rather than cause a panic.
#[test]
fn test_solve_with_unparsable_dependency() {
    use crate::helpers::PackageBuilder;

    let pkg_valid = PackageBuilder::new("sortme")
        .version("1.0.0")
        .build_string("build_a")
        .depends(["python >=3.8"])
        .build();

    let pkg_invalid = PackageBuilder::new("sortme")
        .version("1.0.0")
        .build_string("build_b")
        .depends(["this-is-not-a-valid-matchspec @#$%^&*()"])
        .build();

    let python_pkg = PackageBuilder::new("python").version("3.9.0").build();

    let repo_data = vec![pkg_valid, pkg_invalid, python_pkg];
    let specs = vec![MatchSpec::from_str("sortme", ParseStrictness::Lenient).unwrap()];

    let task = SolverTask {
        specs,
        ..SolverTask::from_iter([&repo_data])
    };

    // Should not panic on the unparsable dependency; either solves around it or errors cleanly.
    match rattler_solve::resolvo::Solver.solve(task) {
        Ok(solution) => {
            let sortme = solution
                .records
                .iter()
                .find(|r| r.package_record.name.as_normalized() == "sortme")
                .expect("sortme package should be in solution");
            assert_eq!(sortme.package_record.build, "build_a");
        }
        Err(e) => {
            println!("Solve returned error (this is acceptable): {e}");
        }
    }
}

/// Packages can be identified purely by their source URL, without any channel.
#[test]
fn test_solve_on_url() {
    let url_str =
        "https://conda.anaconda.org/conda-forge/linux-64/_libgcc_mutex-0.1-conda_forge.tar.bz2";
    let url = Url::parse(url_str).unwrap();

    let specs: Vec<_> = vec![MatchSpec::from_str(url_str, ParseStrictness::Lenient).unwrap()];

    let package_record = PackageRecord::new(
        "_libgcc_mutex".parse().unwrap(),
        VersionWithSource::from_str("0.1").unwrap(),
        "0".to_string(),
    );
    let repo_data: Vec<RepoDataRecord> = vec![RepoDataRecord {
        package_record: package_record.clone(),
        file_name: url_str.to_string(),
        url: url.clone(),
        channel: None,
    }];

    let task = SolverTask {
        specs: specs.clone(),
        strategy: SolveStrategy::default(),
        ..SolverTask::from_iter([&repo_data])
    };

    let pkgs: Vec<RepoDataRecord> = rattler_solve::resolvo::Solver.solve(task).unwrap().records;

    assert_eq!(pkgs.len(), 1);
    assert_eq!(pkgs[0].package_record.name.as_normalized(), "_libgcc_mutex");
    assert_eq!(pkgs[0].url, url);
    assert_eq!(
        pkgs[0].package_record.version,
        Version::from_str("0.1").unwrap(),
        "expected lowest version of _libgcc_mutex"
    );

    // Break the url in the repodata, making it not a direct url record any more.
    let repo_data: Vec<RepoDataRecord> = vec![RepoDataRecord {
        package_record,
        file_name: url_str.to_string(),
        url: Url::from_str("https://false.dont").unwrap(),
        channel: None,
    }];

    let task = SolverTask {
        specs,
        strategy: SolveStrategy::default(),
        ..SolverTask::from_iter([&repo_data])
    };

    let solve_error = rattler_solve::resolvo::Solver.solve(task).unwrap_err();
    assert!(matches!(solve_error, SolveError::Unsolvable(_)));
}

#[test]
fn test_conditional_dependencies() {
    conditional_tests::solve_conditional_dependencies::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_complex_conditional_dependencies() {
    conditional_tests::solve_complex_conditional_dependencies::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_extras_basic() {
    extras_tests::solve_extras_basic::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_extras_version_restriction() {
    extras_tests::solve_extras_version_restriction::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_multiple_extras() {
    extras_tests::solve_multiple_extras::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_extras_complex_constraints() {
    extras_tests::solve_extras_complex_constraints::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_solver_case_favored() {
    solver_case_tests::solve_favored::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_solver_case_constraints() {
    solver_case_tests::solve_constraints::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_solver_case_exclude_newer() {
    solver_case_tests::solve_exclude_newer::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_solver_case_upgrade() {
    solver_case_tests::solve_upgrade::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_solver_case_downgrade() {
    solver_case_tests::solve_downgrade::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_solver_case_install_new() {
    solver_case_tests::solve_install_new::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_solver_case_remove() {
    solver_case_tests::solve_remove::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_solver_case_noop() {
    solver_case_tests::solve_noop::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_lowest_version_strategy() {
    strategy_tests::solve_lowest_version_strategy::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_lowest_version_strategy_transitive() {
    strategy_tests::solve_lowest_version_strategy_transitive::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_lowest_version_direct_strategy() {
    strategy_tests::solve_lowest_version_direct_strategy::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_soft_requirements_basic() {
    soft_requirements_tests::solve_soft_requirements_basic::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_soft_requirements_unsatisfiable() {
    soft_requirements_tests::solve_soft_requirements_unsatisfiable::<rattler_solve::resolvo::Solver>(
    );
}

#[test]
fn test_soft_requirements_conflict() {
    soft_requirements_tests::solve_soft_requirements_conflict::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_soft_requirements_versioned() {
    soft_requirements_tests::solve_soft_requirements_versioned::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_min_age_filters_new_packages() {
    min_age_tests::solve_min_age_filters_new_packages::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_min_age_with_exemption() {
    min_age_tests::solve_min_age_with_exemption::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_min_age_with_dependencies() {
    min_age_tests::solve_min_age_with_dependencies::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_min_age_exempt_dependency() {
    min_age_tests::solve_min_age_exempt_dependency::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_min_age_excludes_unknown_timestamp() {
    min_age_tests::solve_min_age_excludes_unknown_timestamp::<rattler_solve::resolvo::Solver>();
}

#[test]
fn test_min_age_include_unknown_timestamp() {
    min_age_tests::solve_min_age_include_unknown_timestamp::<rattler_solve::resolvo::Solver>();
}
