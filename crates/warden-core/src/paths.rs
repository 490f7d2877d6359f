use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "warden.yaml";
pub const PLANS_DIR: &str = "plans";

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve a task plan argument: an existing file path is used as-is,
/// otherwise `name` is looked up as `plans/<name>.yaml` under `root`.
pub fn plan_path(root: &Path, name: &str) -> PathBuf {
    let direct = Path::new(name);
    if direct.is_file() {
        return direct.to_path_buf();
    }
    let file = if name.ends_with(".yaml") || name.ends_with(".yml") {
        name.to_string()
    } else {
        format!("{name}.yaml")
    };
    root.join(PLANS_DIR).join(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_name_resolves_under_plans_dir() {
        let root = Path::new("/nonexistent-root");
        assert_eq!(
            plan_path(root, "apply-jobs"),
            PathBuf::from("/nonexistent-root/plans/apply-jobs.yaml")
        );
        assert_eq!(
            plan_path(root, "apply-jobs.yml"),
            PathBuf::from("/nonexistent-root/plans/apply-jobs.yml")
        );
    }

    #[test]
    fn existing_file_is_used_directly() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("p.yaml");
        std::fs::write(&file, "name: p").unwrap();
        let arg = file.to_string_lossy().to_string();
        assert_eq!(plan_path(Path::new("/elsewhere"), &arg), file);
    }
}
