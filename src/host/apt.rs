//! apt/dpkg backed package manager.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::CharmError;
use crate::executor::SubprocessBuilder;
use crate::validation::{validate_package_list, PackageSource};

use super::traits::PackageManager;

const KEYSERVER: &str = "hkp://keyserver.ubuntu.com:80";

/// Package manager driving apt-get, dpkg, apt-key and add-apt-repository.
pub struct AptPackageManager {
    timeout: Duration,
}

impl AptPackageManager {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(&self, program: &str) -> SubprocessBuilder {
        SubprocessBuilder::new(program)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .timeout(self.timeout)
    }
}

impl PackageManager for AptPackageManager {
    fn add_source(&mut self, source: &PackageSource) -> Result<(), CharmError> {
        if let Some(key) = &source.key {
            if key.trim_start().starts_with("-----BEGIN") {
                debug!("Importing armored archive key");
                self.command("apt-key")
                    .args(["add", "-"])
                    .stdin(key.as_bytes())
                    .check()
                    .map_err(CharmError::into_install)?;
            } else {
                debug!(key = %key, "Fetching archive key");
                self.command("apt-key")
                    .args(["adv", "--keyserver", KEYSERVER, "--recv-keys", key])
                    .check()
                    .map_err(CharmError::into_install)?;
            }
        }

        self.command("add-apt-repository")
            .args(["--yes", &source.source])
            .check()
            .map_err(CharmError::into_install)?;

        info!(source = %source.source, "Archive source added");
        Ok(())
    }

    fn update(&mut self) -> Result<(), CharmError> {
        self.command("apt-get")
            .arg("update")
            .check()
            .map_err(CharmError::into_install)?;
        info!("Package lists updated");
        Ok(())
    }

    fn install(&mut self, packages: &[String]) -> Result<(), CharmError> {
        validate_package_list(packages)?;

        self.command("apt-get")
            .args([
                "install",
                "-y",
                "--no-install-recommends",
                "-o",
                "Dpkg::Options::=--force-confdef",
                "-o",
                "Dpkg::Options::=--force-confold",
            ])
            .args(packages)
            .check()
            .map_err(CharmError::into_install)?;

        info!(packages = ?packages, "Packages installed");
        Ok(())
    }

    fn install_file(&mut self, path: &Path) -> Result<(), CharmError> {
        let path_str = path.to_string_lossy();
        self.command("dpkg")
            .args(["-i", path_str.as_ref()])
            .check()
            .map_err(CharmError::into_install)?;

        info!(path = %path.display(), "Package file installed");
        Ok(())
    }

    fn purge(&mut self, packages: &[String]) -> Result<(), CharmError> {
        validate_package_list(packages)?;

        self.command("apt-get")
            .args(["purge", "-y"])
            .args(packages)
            .check()
            .map_err(CharmError::into_install)?;

        info!(packages = ?packages, "Packages purged");
        Ok(())
    }
}
