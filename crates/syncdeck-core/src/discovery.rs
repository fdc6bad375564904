use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::warn;

use crate::project::Project;
use crate::project::ProjectFile;

pub const MAX_DEPTH: usize = 4;

const ALLOWED_HIDDEN_DIRS: &[&str] = &[".config", ".mutagen"];

/// Directories that are always searched and in which any YAML file counts as
/// a project.
pub fn user_config_dirs() -> Vec<PathBuf> {
    match dirs::home_dir() {
        Some(home) => vec![
            home.join(".config").join("mutagen").join("projects"),
            home.join(".mutagen").join("projects"),
        ],
        None => Vec::new(),
    }
}

/// Expands a leading `~` or `~/`. Returns `None` when the home directory is unknown.
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    if path == "~" {
        return dirs::home_dir();
    }
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

#[derive(Debug, Clone)]
pub struct ProjectDiscovery {
    base_dir: Option<PathBuf>,
    search_paths: Vec<String>,
    exclude_patterns: Vec<String>,
    user_config_dirs: Vec<PathBuf>,
}

struct Walk<'a> {
    exclude_patterns: &'a [String],
    seen: HashSet<PathBuf>,
    projects: Vec<Project>,
}

impl ProjectDiscovery {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self {
            base_dir,
            search_paths: Vec::new(),
            exclude_patterns: Vec::new(),
            user_config_dirs: user_config_dirs(),
        }
    }

    pub fn with_search_paths(mut self, search_paths: Vec<String>) -> Self {
        self.search_paths = search_paths;
        self
    }

    pub fn with_exclude_patterns(mut self, exclude_patterns: Vec<String>) -> Self {
        self.exclude_patterns = exclude_patterns;
        self
    }

    pub fn with_user_config_dirs(mut self, user_config_dirs: Vec<PathBuf>) -> Self {
        self.user_config_dirs = user_config_dirs;
        self
    }

    /// Search roots in order: base directory, configured paths, user config dirs.
    pub fn search_roots(&self) -> Vec<(PathBuf, bool)> {
        let mut roots = Vec::new();
        if let Some(base) = &self.base_dir {
            roots.push(base.clone());
        }
        roots.extend(self.search_paths.iter().filter_map(|p| expand_tilde(p)));
        roots.extend(self.user_config_dirs.iter().cloned());

        roots
            .into_iter()
            .map(|root| {
                let accept_any_yaml = self.user_config_dirs.contains(&root);
                (root, accept_any_yaml)
            })
            .collect()
    }

    pub fn discover(&self) -> Vec<Project> {
        let mut walk = Walk {
            exclude_patterns: &self.exclude_patterns,
            seen: HashSet::new(),
            projects: Vec::new(),
        };

        for (root, accept_any_yaml) in self.search_roots() {
            if !root.exists() {
                debug!(root = %root.display(), "search root missing, skipping");
                continue;
            }
            walk.visit(&root, 0, accept_any_yaml);
        }

        debug!(count = walk.projects.len(), "project discovery finished");
        walk.projects
    }
}

impl Walk<'_> {
    fn visit(&mut self, dir: &Path, depth: usize, accept_any_yaml: bool) {
        if depth > MAX_DEPTH {
            return;
        }
        let base_name = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.exclude_patterns.iter().any(|p| *p == base_name) {
            return;
        }

        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        let mut entries: Vec<_> = entries.filter_map(Result::ok).collect();
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                if name.starts_with('.') && !ALLOWED_HIDDEN_DIRS.contains(&name.as_str()) {
                    continue;
                }
                self.visit(&path, depth + 1, false);
            } else if !name.ends_with(".lock") && is_project_file_name(&name, accept_any_yaml) {
                self.load(&path);
            }
        }
    }

    fn load(&mut self, path: &Path) {
        let Some(absolute) = absolute_path(path) else {
            return;
        };
        if !self.seen.insert(absolute.clone()) {
            return;
        }

        match ProjectFile::load(&absolute) {
            Ok(file) => {
                debug!(path = %absolute.display(), specs = file.sessions.len(), "loaded project file");
                self.projects.push(Project::new(file));
            }
            Err(err) => warn!("skipping project file: {err}"),
        }
    }
}

/// Joins `path` onto the working directory and folds `.` and `..` lexically.
fn absolute_path(path: &Path) -> Option<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().ok()?.join(path)
    };
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Some(normalized)
}

fn is_yaml(name: &str) -> bool {
    name.ends_with(".yml") || name.ends_with(".yaml")
}

pub fn is_project_file_name(name: &str, accept_any_yaml: bool) -> bool {
    if accept_any_yaml {
        return is_yaml(name);
    }
    name == "mutagen.yml"
        || name == "mutagen.yaml"
        || (name.starts_with("mutagen-") && is_yaml(name))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    const DOC: &str = "sync:\n  web:\n    alpha: /a\n    beta: /b\n";

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, text).expect("write");
    }

    fn discover_in(root: &Path) -> Vec<PathBuf> {
        ProjectDiscovery::new(Some(root.to_path_buf()))
            .with_exclude_patterns(vec!["node_modules".to_string(), "target".to_string()])
            .with_user_config_dirs(Vec::new())
            .discover()
            .into_iter()
            .map(|project| project.file.path)
            .collect()
    }

    #[test]
    fn project_file_name_rules() {
        assert!(is_project_file_name("mutagen.yml", false));
        assert!(is_project_file_name("mutagen.yaml", false));
        assert!(is_project_file_name("mutagen-dev.yml", false));
        assert!(!is_project_file_name("docker-compose.yml", false));
        assert!(!is_project_file_name("mutagen-dev.txt", false));
        assert!(is_project_file_name("docker-compose.yml", true));
        assert!(!is_project_file_name("notes.md", true));
    }

    #[test]
    fn depth_four_is_found_and_depth_five_is_not() {
        let dir = tempdir().expect("tmpdir");
        let shallow = dir.path().join("a/b/c/d/mutagen.yml");
        let deep = dir.path().join("a/b/c/d/e/mutagen-deep.yml");
        write(&shallow, DOC);
        write(&deep, DOC);

        assert_eq!(discover_in(dir.path()), vec![shallow]);
    }

    #[test]
    fn excluded_and_hidden_directories_are_pruned() {
        let dir = tempdir().expect("tmpdir");
        let kept = dir.path().join("targeting-app/mutagen.yml");
        let allowed_hidden = dir.path().join(".mutagen/mutagen.yml");
        write(&kept, DOC);
        write(&allowed_hidden, DOC);
        write(&dir.path().join("target/mutagen.yml"), DOC);
        write(&dir.path().join("web/node_modules/pkg/mutagen.yml"), DOC);
        write(&dir.path().join(".cache/mutagen.yml"), DOC);

        assert_eq!(discover_in(dir.path()), vec![allowed_hidden, kept]);
    }

    #[test]
    fn malformed_and_lock_files_are_skipped() {
        let dir = tempdir().expect("tmpdir");
        let good = dir.path().join("mutagen.yml");
        write(&good, DOC);
        write(&dir.path().join("mutagen-broken.yml"), "sync: [oops");
        write(&dir.path().join("mutagen.yml.lock"), DOC);

        assert_eq!(discover_in(dir.path()), vec![good]);
    }

    #[test]
    fn user_config_dirs_accept_any_yaml_at_top_level_only() {
        let base = tempdir().expect("base");
        let user = tempdir().expect("user");
        let top = user.path().join("remote-box.yml");
        write(&top, DOC);
        write(&user.path().join("nested/other.yml"), DOC);

        let found: Vec<PathBuf> = ProjectDiscovery::new(Some(base.path().to_path_buf()))
            .with_user_config_dirs(vec![user.path().to_path_buf()])
            .discover()
            .into_iter()
            .map(|project| project.file.path)
            .collect();
        assert_eq!(found, vec![top]);
    }

    #[test]
    fn same_file_reached_twice_loads_once() {
        let dir = tempdir().expect("tmpdir");
        write(&dir.path().join("demo/mutagen.yml"), DOC);

        let projects = ProjectDiscovery::new(Some(dir.path().to_path_buf()))
            .with_search_paths(vec![dir.path().join("demo").display().to_string()])
            .with_user_config_dirs(Vec::new())
            .discover();
        assert_eq!(projects.len(), 1);
    }

    #[test]
    fn parent_components_are_folded_before_dedup() {
        let dir = tempdir().expect("tmpdir");
        let file = dir.path().join("demo/mutagen.yml");
        write(&file, DOC);
        fs::create_dir_all(dir.path().join("other")).expect("mkdir");

        let found: Vec<PathBuf> = ProjectDiscovery::new(Some(dir.path().join("other/../demo")))
            .with_search_paths(vec![dir.path().join("./demo").display().to_string()])
            .with_user_config_dirs(Vec::new())
            .discover()
            .into_iter()
            .map(|project| project.file.path)
            .collect();
        assert_eq!(found, vec![file]);
    }

    #[test]
    fn absolute_path_folds_dot_components() {
        assert_eq!(
            absolute_path(Path::new("/srv/./a/../b/mutagen.yml")),
            Some(PathBuf::from("/srv/b/mutagen.yml"))
        );
    }

    #[test]
    fn missing_roots_yield_no_projects() {
        let dir = tempdir().expect("tmpdir");
        let projects = ProjectDiscovery::new(Some(dir.path().join("missing")))
            .with_search_paths(vec!["/definitely/not/here".to_string()])
            .with_user_config_dirs(Vec::new())
            .discover();
        assert!(projects.is_empty());
    }
}
