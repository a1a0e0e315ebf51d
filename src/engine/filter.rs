use std::collections::HashSet;

use crate::filesystem::DirEntry;

/// Decides which listed entries become nodes. Rejected entries are treated
/// exactly like entries that are not on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    hide_dotfiles: bool,
    hide_by_name: HashSet<String>,
}

impl EntryFilter {
    pub fn new(hide_dotfiles: bool, hide_by_name: impl IntoIterator<Item = String>) -> Self {
        Self {
            hide_dotfiles,
            hide_by_name: hide_by_name.into_iter().collect(),
        }
    }

    pub fn accepts(&self, entry: &DirEntry) -> bool {
        !(self.hide_dotfiles && entry.name.starts_with('.'))
            && !self.hide_by_name.contains(&entry.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::EntryKind;
    use rstest::*;

    #[rstest]
    #[case(".env", false)]
    #[case("node_modules", false)]
    #[case("src", true)]
    #[case("env.", true)]
    fn filter_hides_dotfiles_and_names(#[case] name: &str, #[case] accepted: bool) {
        let filter = EntryFilter::new(true, ["node_modules".to_string()]);

        assert_eq!(filter.accepts(&DirEntry::new(name, EntryKind::File)), accepted);
    }

    #[test]
    fn default_filter_accepts_everything() {
        let filter = EntryFilter::default();

        assert!(filter.accepts(&DirEntry::new(".git", EntryKind::Directory)));
    }
}
