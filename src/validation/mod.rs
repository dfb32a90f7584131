//! Input validation module.
//!
//! Provides validators for charm options, package names and archive sources.

mod options;
mod package_name;
mod sources;

pub use options::{validate_optional_url, validate_port};
pub use package_name::{is_valid_package_name, validate_package_list, validate_package_name};
pub use sources::{parse_sources, validate_source, PackageSource};
