//! Availability report for the secondary engine's jar dependencies

use crate::config::SecondaryEngineConfig;
use serde::Serialize;
use std::path::PathBuf;

/// A jar the Saxon invocation puts on its classpath
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JarDependency {
    pub name: &'static str,
    pub version: &'static str,
    pub url: &'static str,
}

pub const SAXON_HE: JarDependency = JarDependency {
    name: "Saxon-HE",
    version: "12.0",
    url: "https://repo1.maven.org/maven2/net/sf/saxon/Saxon-HE/12.0/Saxon-HE-12.0.jar",
};

pub const XMLRESOLVER: JarDependency = JarDependency {
    name: "xmlresolver",
    version: "5.2.1",
    url: "https://repo1.maven.org/maven2/org/xmlresolver/xmlresolver/5.2.1/xmlresolver-5.2.1.jar",
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyStatus {
    pub name: &'static str,
    pub version: &'static str,
    pub path: PathBuf,
    pub url: &'static str,
    pub present: bool,
}

/// Check each configured jar path. Nothing is downloaded.
pub fn check(config: &SecondaryEngineConfig) -> Vec<DependencyStatus> {
    [
        (SAXON_HE, &config.saxon_jar),
        (XMLRESOLVER, &config.xmlresolver_jar),
    ]
    .into_iter()
    .map(|(dep, path)| DependencyStatus {
        name: dep.name,
        version: dep.version,
        path: path.clone(),
        url: dep.url,
        present: path.is_file(),
    })
    .collect()
}
