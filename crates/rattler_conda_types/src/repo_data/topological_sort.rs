use crate::PackageRecord;
use fxhash::{FxHashMap, FxHashSet};

/// Sorts the packages topologically
///
/// This function is deterministic, meaning that it will return the same result regardless of the
/// order of `packages` and of the `depends` vector inside the records.
///
/// If cycles are encountered, and one of the packages in the cycle is noarch, the noarch package
/// is sorted _after_ the other packages in the cycle. This is done to ensure that the noarch
/// package is installed last, so that it can be linked correctly (ie. compiled with Python if
/// necessary).
///
/// Note that this function only works for packages with unique names.
pub fn sort_topologically<T: AsRef<PackageRecord> + Clone>(packages: Vec<T>) -> Vec<T> {
    let mut all_packages: FxHashMap<String, T> = packages
        .iter()
        .cloned()
        .map(|p| (p.as_ref().name.as_normalized().to_owned(), p))
        .collect();

    let cycles = find_all_cycles(&all_packages);
    let cycle_breaks = break_cycles(&cycles, &all_packages);
    let roots = get_graph_roots(&packages, &cycle_breaks);

    get_topological_order(roots, &mut all_packages, &cycle_breaks)
}

/// Find cycles with DFS
fn find_all_cycles<T: AsRef<PackageRecord>>(packages: &FxHashMap<String, T>) -> Vec<Vec<String>> {
    let mut all_cycles = Vec::new();
    let mut visited = FxHashSet::default();

    for package in packages.keys() {
        if !visited.contains(package) {
            let mut path = Vec::new();
            dfs(package, packages, &mut visited, &mut path, &mut all_cycles);
        }
    }

    all_cycles
}

fn dfs<T: AsRef<PackageRecord>>(
    node: &str,
    packages: &FxHashMap<String, T>,
    visited: &mut FxHashSet<String>,
    path: &mut Vec<String>,
    all_cycles: &mut Vec<Vec<String>>,
) {
    if path.contains(&node.to_string()) {
        // Cycle detected
        let cycle_start = path.iter().position(|x| x == node).unwrap();
        all_cycles.push(path[cycle_start..].to_vec());
        return;
    }

    if visited.contains(node) {
        return;
    }

    visited.insert(node.to_string());
    path.push(node.to_string());

    if let Some(package) = packages.get(node) {
        for dependency in package.as_ref().depends.iter() {
            let dependency = package_name_from_match_spec(dependency);
            dfs(dependency, packages, visited, path, all_cycles);
        }
    }

    path.pop();
}

/// Retrieves the names of the packages that form the roots of the graph and breaks specified
/// cycles (e.g. if there is a cycle between A and B and there is a `cycle_break (A, B)`, the edge
/// A -> B will be removed)
fn get_graph_roots<T: AsRef<PackageRecord>>(
    records: &[T],
    cycle_breaks: &FxHashSet<(String, String)>,
) -> Vec<String> {
    let all_packages: FxHashSet<_> = records
        .iter()
        .map(|r| r.as_ref().name.as_normalized())
        .collect();

    let dependencies: FxHashSet<_> = records
        .iter()
        .flat_map(|r| {
            r.as_ref()
                .depends
                .iter()
                .map(|d| package_name_from_match_spec(d))
                .filter(|d| {
                    // filter out circular dependencies
                    !cycle_breaks
                        .contains(&(r.as_ref().name.as_normalized().to_owned(), (*d).to_string()))
                })
        })
        .collect();

    all_packages
        .difference(&dependencies)
        .map(ToString::to_string)
        .collect()
}

/// Helper enum to model the recursion inside `get_topological_order` as iteration, to support
/// dependency graphs of arbitrary depth without causing stack overflows
enum Action {
    ResolveAndInstall(String),
    Install(String),
}

/// Breaks cycles by removing the edges that form them
/// Edges from arch to noarch packages are removed to break the cycles.
fn break_cycles<T: AsRef<PackageRecord>>(
    cycles: &[Vec<String>],
    packages: &FxHashMap<String, T>,
) -> FxHashSet<(String, String)> {
    // we record the edges that we want to remove
    let mut cycle_breaks = FxHashSet::default();

    for cycle in cycles {
        for i in 0..cycle.len() {
            let pi1 = &cycle[i];
            // Next package in cycle, wraps around
            let pi2 = &cycle[(i + 1) % cycle.len()];

            let p1 = &packages[pi1];
            let p2 = &packages[pi2];

            // prefer arch packages over noarch packages
            let p1_noarch = p1.as_ref().noarch.is_none();
            let p2_noarch = p2.as_ref().noarch.is_none();

            if p1_noarch && !p2_noarch {
                cycle_breaks.insert((pi1.clone(), pi2.clone()));
                break;
            } else if !p1_noarch && p2_noarch || i == cycle.len() - 1 {
                // This branch should also be taken if we're at the last package in the cycle and no noarch packages are found
                cycle_breaks.insert((pi2.clone(), pi1.clone()));
                break;
            }
        }
    }
    tracing::debug!("Breaking cycle: {:?}", cycle_breaks);
    cycle_breaks
}

/// Returns a vector containing the topological ordering of the packages, based on the provided
/// roots
fn get_topological_order<T: AsRef<PackageRecord>>(
    mut roots: Vec<String>,
    packages: &mut FxHashMap<String, T>,
    cycle_breaks: &FxHashSet<(String, String)>,
) -> Vec<T> {
    // Sorting makes this step deterministic (i.e. the same output is returned, regardless of the
    // original order of the input)
    roots.sort();

    // Store the name of each package in `order` according to the graph's topological sort
    let mut order = Vec::new();
    let mut visited_packages = FxHashSet::default();
    let mut stack: Vec<_> = roots.into_iter().map(Action::ResolveAndInstall).collect();
    while let Some(action) = stack.pop() {
        match action {
            Action::Install(package_name) => {
                order.push(package_name);
            }
            Action::ResolveAndInstall(package_name) => {
                let already_visited = !visited_packages.insert(package_name.clone());
                if already_visited {
                    continue;
                }

                let mut deps = match &packages.get(package_name.as_str()) {
                    Some(p) => p
                        .as_ref()
                        .depends
                        .iter()
                        .map(|d| package_name_from_match_spec(d).to_string())
                        .collect::<Vec<_>>(),
                    None => {
                        // This is a virtual package, so no real package was found for it
                        continue;
                    }
                };

                // Remove the edges that form cycles
                deps.retain(|dep| !cycle_breaks.contains(&(package_name.clone(), dep.clone())));

                // Sorting makes this step deterministic (i.e. the same output is returned, regardless of the
                // original order of the input)
                deps.sort();

                // Install dependencies, then ourselves (the order is reversed because of the stack)
                stack.push(Action::Install(package_name));
                stack.extend(deps.into_iter().map(Action::ResolveAndInstall));
            }
        }
    }

    // Apply the order we just obtained
    let mut output = Vec::with_capacity(order.len());
    for name in order {
        let package = packages.remove(&name).unwrap();
        output.push(package);
    }

    output
}

/// Helper function to obtain the package name from a match spec
fn package_name_from_match_spec(d: &str) -> &str {
    // Unwrap is safe because split always returns at least one value
    d.split([' ', '=']).next().unwrap()
}
