//! Template repository host detection.

use url::Url;

/// Where a template repository lives, which decides how it is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryHost {
    /// `https://github.com/{owner}/{repo}`
    GitHub { owner: String, repo: String },
    /// `https://dev.azure.com/{org}/{project}/_git/{repo}` or
    /// `https://{org}.visualstudio.com/{project}/_git/{repo}`
    AzureDevOps {
        organization: String,
        project: String,
        repo: String,
    },
    /// Anything else, fetched with `git clone`.
    Generic,
}

impl RepositoryHost {
    pub fn detect(repository_url: &str) -> Self {
        let Ok(url) = Url::parse(repository_url.trim()) else {
            // scp-style `git@host:org/repo.git` and local paths
            return RepositoryHost::Generic;
        };
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let segments: Vec<String> = url
            .path_segments()
            .map(|s| {
                s.filter(|p| !p.is_empty())
                    .map(|p| urlencoding::decode(p).map_or_else(|_| p.to_string(), |d| d.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        match host.as_str() {
            "github.com" | "www.github.com" if segments.len() >= 2 => RepositoryHost::GitHub {
                owner: segments[0].clone(),
                repo: segments[1].trim_end_matches(".git").to_string(),
            },
            "dev.azure.com" => match segments.as_slice() {
                [org, project, git, repo, ..] if git == "_git" => RepositoryHost::AzureDevOps {
                    organization: org.clone(),
                    project: project.clone(),
                    repo: repo.clone(),
                },
                _ => RepositoryHost::Generic,
            },
            h if h.ends_with(".visualstudio.com") => match segments.as_slice() {
                [project, git, repo, ..] if git == "_git" => RepositoryHost::AzureDevOps {
                    organization: h.trim_end_matches(".visualstudio.com").to_string(),
                    project: project.clone(),
                    repo: repo.clone(),
                },
                _ => RepositoryHost::Generic,
            },
            _ => RepositoryHost::Generic,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RepositoryHost::GitHub { .. } => "github",
            RepositoryHost::AzureDevOps { .. } => "azure-devops",
            RepositoryHost::Generic => "git",
        }
    }
}

/// `url` with credentials removed, for logs.
pub fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() || !parsed.username().is_empty() => {
            if parsed.set_username("").is_ok() && parsed.set_password(None).is_ok() {
                parsed.to_string()
            } else {
                "***".to_string()
            }
        }
        _ => url.to_string(),
    }
}
