//! Package name validation.
//!
//! Debian package names: lowercase alphanumerics plus `+`, `-` and `.`,
//! at least two characters, starting with an alphanumeric. An optional
//! `=version` suffix is accepted.

use crate::error::{CharmError, ValidationErrorKind};

/// Check whether a package name is syntactically valid.
pub fn is_valid_package_name(name: &str) -> bool {
    // Strip version specifier if present (e.g., "cadvisor=0.44.0-1" -> "cadvisor")
    let base_name = name.split('=').next().unwrap_or(name);

    if base_name.len() < 2 {
        return false;
    }

    let mut chars = base_name.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .unwrap_or(false);

    first_ok
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.'))
}

/// Validate a single package name.
pub fn validate_package_name(name: &str) -> Result<(), CharmError> {
    if name.contains("..") || name.contains('/') || name.contains('\n') || name.contains(';') {
        return Err(CharmError::Validation {
            kind: ValidationErrorKind::InvalidPackageName {
                package: name.to_string(),
            },
        });
    }

    if !is_valid_package_name(name) {
        return Err(CharmError::Validation {
            kind: ValidationErrorKind::InvalidPackageName {
                package: name.to_string(),
            },
        });
    }

    Ok(())
}

/// Validate a list of package names.
pub fn validate_package_list(packages: &[String]) -> Result<(), CharmError> {
    if packages.is_empty() {
        return Err(CharmError::Validation {
            kind: ValidationErrorKind::InvalidOption {
                option: "packages".to_string(),
                message: "Package list cannot be empty".to_string(),
            },
        });
    }

    for package in packages {
        validate_package_name(package)?;
    }

    Ok(())
}
