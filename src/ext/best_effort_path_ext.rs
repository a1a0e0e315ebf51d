use std::path::{Component, Path, PathBuf};

/// Renders a path for log and error messages, resolving it when possible.
pub fn best_effort_path_display(path: &Path) -> String {
    match path.canonicalize() {
        Ok(canonical_path) => canonical_path.display().to_string(),
        Err(_) => {
            let absolute_path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                match std::env::current_dir() {
                    Ok(current_dir) => current_dir.join(path),
                    Err(_) => path.to_path_buf(),
                }
            };

            normalize_path(&absolute_path).display().to_string()
        }
    }
}

/// Resolves `.` and `..` lexically, without touching the filesystem.
///
/// Node paths are keys, so two spellings of one location must collapse to
/// the same value. Symlinks are deliberately left unresolved.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            _ => components.push(component),
        }
    }

    if components.is_empty() {
        return PathBuf::from(".");
    }
    components.iter().collect()
}

pub trait BestEffortPathExt {
    fn best_effort_path_display(&self) -> String;
}

impl BestEffortPathExt for Path {
    fn best_effort_path_display(&self) -> String {
        best_effort_path_display(self)
    }
}

impl BestEffortPathExt for PathBuf {
    fn best_effort_path_display(&self) -> String {
        best_effort_path_display(self)
    }
}

impl BestEffortPathExt for &str {
    fn best_effort_path_display(&self) -> String {
        best_effort_path_display(Path::new(self))
    }
}

impl BestEffortPathExt for String {
    fn best_effort_path_display(&self) -> String {
        best_effort_path_display(Path::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case("/a/b/../c", "/a/c")]
    #[case("/a/./b/", "/a/b")]
    #[case("/../a", "/a")]
    #[case("a/../../b", "../b")]
    #[case("./", ".")]
    #[case("/", "/")]
    fn normalize_resolves_dots_lexically(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_path(Path::new(input)), PathBuf::from(expected));
    }

    #[test]
    fn display_falls_back_for_missing_paths() {
        let shown = "/definitely/not/../here".best_effort_path_display();

        assert_eq!(shown, "/definitely/here");
    }
}
