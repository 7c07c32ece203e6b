use std::path::{Component, Path, PathBuf};

/// Resolves paths written in a config file relative to that file's directory.
#[derive(Clone)]
pub struct PathResolver {
    base_dir: PathBuf,
}

impl PathResolver {
    pub fn new(config_path: &Path) -> Self {
        let base_dir = config_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        Self { base_dir }
    }

    pub fn resolve(&self, p: &mut PathBuf) {
        if p.as_os_str().is_empty() || p.is_absolute() {
            return;
        }
        *p = self.join_clean(p);
    }

    pub fn resolve_opt(&self, p: &mut Option<PathBuf>) {
        if let Some(p) = p.as_mut() {
            self.resolve(p);
        }
    }

    fn join_clean(&self, rel: &Path) -> PathBuf {
        let joined = self.base_dir.join(rel);

        let mut out = PathBuf::new();
        for c in joined.components() {
            match c {
                Component::CurDir => {}
                Component::ParentDir => {
                    out.pop();
                }
                Component::RootDir | Component::Prefix(_) | Component::Normal(_) => {
                    out.push(c.as_os_str())
                }
            }
        }
        if out.as_os_str().is_empty() {
            out.push(".");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_joined_to_config_dir() {
        let r = PathResolver::new(Path::new("/srv/carfacts/carfacts.yaml"));
        let mut p = PathBuf::from("./data/../prompts/report.yaml");
        r.resolve(&mut p);
        assert_eq!(p, PathBuf::from("/srv/carfacts/prompts/report.yaml"));
    }

    #[test]
    fn test_absolute_untouched() {
        let r = PathResolver::new(Path::new("/srv/carfacts/carfacts.yaml"));
        let mut p = Some(PathBuf::from("/var/lib/reports.db"));
        r.resolve_opt(&mut p);
        assert_eq!(p, Some(PathBuf::from("/var/lib/reports.db")));
    }

    #[test]
    fn test_bare_config_name_keeps_relative_path() {
        let r = PathResolver::new(Path::new("carfacts.yaml"));
        let mut p = PathBuf::from(".carfacts/reports.db");
        r.resolve(&mut p);
        assert_eq!(p, PathBuf::from(".carfacts/reports.db"));
    }
}
