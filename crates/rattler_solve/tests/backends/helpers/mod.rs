pub mod package_builder;
pub mod solver_case;

pub use package_builder::PackageBuilder;
pub use solver_case::{run_solver_cases, SolverCase};
