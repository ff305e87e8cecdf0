//! Clone source parsing and checkout location derivation

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Parsed repository source information
#[derive(Debug, Clone)]
pub struct RepoUrl {
    /// Repository owner/organization
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Full clone URL
    pub clone_url: String,
    /// Host (e.g., "github.com")
    pub host: String,
}

impl RepoUrl {
    /// Parse a repository URL or shorthand
    ///
    /// Supports:
    /// - `https://github.com/owner/repo`
    /// - `https://github.com/owner/repo.git`
    /// - `git@github.com:owner/repo.git`
    /// - `owner/repo` (assumes GitHub)
    ///
    /// Filesystem paths are not URLs; callers fall back to
    /// [`derive_checkout_name`] for those.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        // Handle owner/repo shorthand (assumes GitHub). Leading '.' or '/'
        // means a filesystem path, not a shorthand.
        if !input.contains("://")
            && !input.contains('@')
            && input.contains('/')
            && !input.starts_with('.')
            && !input.starts_with('/')
        {
            let parts: Vec<&str> = input.split('/').collect();
            if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
                let owner = parts[0].to_string();
                let repo = parts[1].trim_end_matches(".git").to_string();
                return Ok(Self {
                    owner: owner.clone(),
                    repo: repo.clone(),
                    clone_url: format!("https://github.com/{}/{}.git", owner, repo),
                    host: "github.com".to_string(),
                });
            }
        }

        // Handle git@ URLs (e.g., git@github.com:owner/repo.git)
        if input.starts_with("git@") {
            if let Some(rest) = input.strip_prefix("git@") {
                if let Some((host, path)) = rest.split_once(':') {
                    let path = path.trim_end_matches(".git");
                    let parts: Vec<&str> = path.split('/').collect();
                    if parts.len() >= 2 {
                        let owner = parts[0].to_string();
                        let repo = parts[1].to_string();
                        return Ok(Self {
                            owner,
                            repo,
                            clone_url: input.to_string(),
                            host: host.to_string(),
                        });
                    }
                }
            }
        }

        // Handle https:// URLs
        if input.starts_with("https://") || input.starts_with("http://") {
            if let Ok(url) = url::Url::parse(input) {
                let host = url.host_str().unwrap_or("").to_string();
                let path = url.path().trim_start_matches('/').trim_end_matches(".git");
                let parts: Vec<&str> = path.split('/').collect();

                if parts.len() >= 2 {
                    let owner = parts[0].to_string();
                    let repo = parts[1].to_string();
                    let clone_url = if input.ends_with(".git") {
                        input.to_string()
                    } else {
                        format!("{}.git", input)
                    };

                    return Ok(Self {
                        owner,
                        repo,
                        clone_url,
                        host,
                    });
                }
            }
        }

        Err(Error::Clone {
            url: input.to_string(),
            reason: "not a recognized repository URL (expected owner/repo, \
                     https://host/owner/repo, or git@host:owner/repo.git)"
                .to_string(),
        })
    }

    /// Get the directory name used for a derived checkout (owner-repo)
    pub fn checkout_name(&self) -> String {
        format!("{}-{}", self.owner, self.repo)
    }
}

/// Get the default directory derived checkouts are created under
///
/// Returns `~/.cache/drover/checkouts`
pub fn default_checkout_dir() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| Error::Config("Could not determine cache directory".to_string()))?;

    Ok(cache_dir.join("drover").join("checkouts"))
}

/// Derive a checkout directory name from a clone source
///
/// URLs derive `owner-repo`; filesystem paths (and anything unparseable as a
/// URL) derive the path basename with a trailing `.git` stripped.
pub fn derive_checkout_name(source: &str) -> Result<String> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Err(Error::Clone {
            url: source.to_string(),
            reason: "empty clone source".to_string(),
        });
    }

    let looks_like_path =
        trimmed.starts_with('/') || trimmed.starts_with('.') || trimmed.starts_with('~');

    if !looks_like_path {
        if let Ok(url) = RepoUrl::parse(trimmed) {
            return Ok(url.checkout_name());
        }
    }

    let stem = Path::new(trimmed.trim_end_matches('/'))
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.trim_end_matches(".git").to_string())
        .unwrap_or_default();

    if stem.is_empty() {
        return Err(Error::Clone {
            url: source.to_string(),
            reason: "cannot derive a checkout name from the source".to_string(),
        });
    }

    Ok(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand() {
        let url = RepoUrl::parse("owner/repo").unwrap();
        assert_eq!(url.owner, "owner");
        assert_eq!(url.repo, "repo");
        assert_eq!(url.host, "github.com");
        assert_eq!(url.clone_url, "https://github.com/owner/repo.git");
    }

    #[test]
    fn test_parse_https() {
        let url = RepoUrl::parse("https://github.com/owner/repo").unwrap();
        assert_eq!(url.owner, "owner");
        assert_eq!(url.repo, "repo");
        assert_eq!(url.host, "github.com");
    }

    #[test]
    fn test_parse_https_with_git() {
        let url = RepoUrl::parse("https://github.com/owner/repo.git").unwrap();
        assert_eq!(url.owner, "owner");
        assert_eq!(url.repo, "repo");
        assert_eq!(url.clone_url, "https://github.com/owner/repo.git");
    }

    #[test]
    fn test_parse_git_ssh() {
        let url = RepoUrl::parse("git@github.com:owner/repo.git").unwrap();
        assert_eq!(url.owner, "owner");
        assert_eq!(url.repo, "repo");
        assert_eq!(url.host, "github.com");
    }

    #[test]
    fn test_parse_rejects_paths() {
        assert!(RepoUrl::parse("./local/repo").is_err());
        assert!(RepoUrl::parse("/srv/git/repo").is_err());
        assert!(RepoUrl::parse("invalid").is_err());
        assert!(RepoUrl::parse("").is_err());
    }

    #[test]
    fn test_checkout_name() {
        let url = RepoUrl::parse("owner/repo").unwrap();
        assert_eq!(url.checkout_name(), "owner-repo");
    }

    #[test]
    fn test_derive_from_url() {
        assert_eq!(
            derive_checkout_name("https://example.com/team/widget.git").unwrap(),
            "team-widget"
        );
    }

    #[test]
    fn test_derive_from_path() {
        assert_eq!(derive_checkout_name("/srv/git/widget.git").unwrap(), "widget");
        assert_eq!(derive_checkout_name("../widget").unwrap(), "widget");
        assert_eq!(derive_checkout_name("widget").unwrap(), "widget");
    }

    #[test]
    fn test_derive_empty_source() {
        assert!(derive_checkout_name("").is_err());
        assert!(derive_checkout_name("   ").is_err());
    }

    #[test]
    fn test_default_checkout_dir() {
        let dir = default_checkout_dir().unwrap();
        let text = dir.to_str().unwrap();
        assert!(text.contains("drover"));
        assert!(text.contains("checkouts"));
    }
}
