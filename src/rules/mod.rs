//! Decides whether input metrics may be collected for an application.

use std::{collections::HashSet, path::Path};

use anyhow::Result;
use tracing::warn;

const INCLUDE_SECTION: &str = "[include_apps]";
const EXCLUDE_SECTION: &str = "[exclude_apps]";

/// Per-application collection policy. Stateless after construction.
///
/// Resolution order: a non-empty include set allows only its members, otherwise members of the
/// exclude set are denied, otherwise collection is allowed.
#[derive(Debug, Default, Clone)]
pub struct RulePolicy {
    include_apps: HashSet<String>,
    exclude_apps: HashSet<String>,
}

impl RulePolicy {
    pub fn new(
        include_apps: impl IntoIterator<Item = String>,
        exclude_apps: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            include_apps: include_apps.into_iter().map(|v| v.to_lowercase()).collect(),
            exclude_apps: exclude_apps.into_iter().map(|v| v.to_lowercase()).collect(),
        }
    }

    /// Reads a policy from the line-oriented rules format: two named sections, one lowercase
    /// application identifier per non-blank, non-comment line. A missing file yields the
    /// permissive default.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Rules file {path:?} not found, proceeding without exclusions");
            return Ok(Self::default());
        }
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    pub fn parse(contents: &str) -> Self {
        enum Section {
            None,
            Include,
            Exclude,
        }

        let mut include_apps = HashSet::new();
        let mut exclude_apps = HashSet::new();
        let mut section = Section::None;

        for raw in contents.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.to_lowercase().as_str() {
                INCLUDE_SECTION => section = Section::Include,
                EXCLUDE_SECTION => section = Section::Exclude,
                entry => match section {
                    Section::Include => {
                        include_apps.insert(entry.to_string());
                    }
                    Section::Exclude => {
                        exclude_apps.insert(entry.to_string());
                    }
                    Section::None => {
                        warn!("Ignoring rules entry {entry:?} outside of any section");
                    }
                },
            }
        }

        Self {
            include_apps,
            exclude_apps,
        }
    }

    pub fn is_app_metrics_allowed(&self, exe: &str) -> bool {
        let name = exe.to_lowercase();
        if !self.include_apps.is_empty() {
            return self.include_apps.contains(&name);
        }
        !self.exclude_apps.contains(&name)
    }

    pub fn include_apps(&self) -> &HashSet<String> {
        &self.include_apps
    }

    pub fn exclude_apps(&self) -> &HashSet<String> {
        &self.exclude_apps
    }
}
