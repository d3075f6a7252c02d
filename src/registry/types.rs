//! Supported repository types

use std::fmt;
use std::str::FromStr;

use crate::error::ComposeError;

/// Construction rule shared by a family of repository types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Content served from the repository storage
    Hosted,
    /// Content fetched from a remote through the shared client
    Proxy,
    /// Docker registry over the repository storage
    Docker,
    /// Docker registry proxy; routes itself in shared mode
    DockerProxy,
    /// Fan-out over member repositories
    Group,
}

/// Repository type from the `type` field of a repository file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoType {
    File,
    FileProxy,
    Npm,
    NpmProxy,
    Gem,
    Helm,
    Rpm,
    Php,
    Nuget,
    Maven,
    MavenProxy,
    MavenGroup,
    Go,
    Pypi,
    PypiProxy,
    Docker,
    DockerProxy,
}

impl RepoType {
    /// Every supported type
    pub const ALL: [RepoType; 17] = [
        RepoType::File,
        RepoType::FileProxy,
        RepoType::Npm,
        RepoType::NpmProxy,
        RepoType::Gem,
        RepoType::Helm,
        RepoType::Rpm,
        RepoType::Php,
        RepoType::Nuget,
        RepoType::Maven,
        RepoType::MavenProxy,
        RepoType::MavenGroup,
        RepoType::Go,
        RepoType::Pypi,
        RepoType::PypiProxy,
        RepoType::Docker,
        RepoType::DockerProxy,
    ];

    /// Name as written in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoType::File => "file",
            RepoType::FileProxy => "file-proxy",
            RepoType::Npm => "npm",
            RepoType::NpmProxy => "npm-proxy",
            RepoType::Gem => "gem",
            RepoType::Helm => "helm",
            RepoType::Rpm => "rpm",
            RepoType::Php => "php",
            RepoType::Nuget => "nuget",
            RepoType::Maven => "maven",
            RepoType::MavenProxy => "maven-proxy",
            RepoType::MavenGroup => "maven-group",
            RepoType::Go => "go",
            RepoType::Pypi => "pypi",
            RepoType::PypiProxy => "pypi-proxy",
            RepoType::Docker => "docker",
            RepoType::DockerProxy => "docker-proxy",
        }
    }

    /// How slices of this type are built and decorated
    pub fn rule(&self) -> Rule {
        match self {
            RepoType::FileProxy
            | RepoType::NpmProxy
            | RepoType::MavenProxy
            | RepoType::PypiProxy => Rule::Proxy,
            RepoType::Docker => Rule::Docker,
            RepoType::DockerProxy => Rule::DockerProxy,
            RepoType::MavenGroup => Rule::Group,
            _ => Rule::Hosted,
        }
    }
}

impl FromStr for RepoType {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RepoType::ALL
            .iter()
            .copied()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| ComposeError::UnsupportedType(s.to_string()))
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
