use compio::{fs::File, io::AsyncReadExt, io::BufReader};
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use std::{
    borrow::Cow,
    io::{Cursor, ErrorKind},
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::{engine::EntryFilter, ext::BestEffortPathExt, tree::SortOrder};

const CONFIG_FILE_NAME: &str = ".sidetree.yaml";

fn get_config_file_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    pub hide_dotfiles: bool,
    pub hide_by_name: Vec<String>,
    pub hide_gitignored: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            hide_dotfiles: true,
            hide_by_name: vec![".git".to_string()],
            hide_gitignored: false,
        }
    }
}

impl FilterConfig {
    pub fn entry_filter(&self) -> EntryFilter {
        EntryFilter::new(self.hide_dotfiles, self.hide_by_name.iter().cloned())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplorerConfig {
    pub sort: SortOrder,
    pub watch: bool,
    pub filters: FilterConfig,
}

impl ExplorerConfig {
    /// Reads `.sidetree.yaml` from `root`. A missing file means defaults.
    pub async fn read(root: &Path) -> Result<Self, ExplorerConfigError> {
        let path = get_config_file_path(root);
        match File::open(&path).await {
            Ok(file) => Self::from_file(file, &path).await,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(
                    "No config file at {}, using defaults",
                    path.best_effort_path_display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(e).context(ReadSnafu {
                file_path: path.best_effort_path_display(),
            }),
        }
    }

    pub async fn from_path(path: PathBuf) -> Result<Self, ExplorerConfigError> {
        debug!("Opening config file: {}", path.best_effort_path_display());
        let file = File::open(&path).await.context(ReadSnafu {
            file_path: path.best_effort_path_display(),
        })?;
        Self::from_file(file, &path).await
    }

    async fn from_file(file: File, path: &Path) -> Result<Self, ExplorerConfigError> {
        debug!("Reading config file");
        let cursor = Cursor::new(file);
        let mut reader = BufReader::new(cursor);
        let res = reader.read_to_string(String::new()).await;
        match res.0 {
            Ok(n) => debug!("Successfully read config file: {n} bytes"),
            _ => {
                res.0.context(ReadSnafu {
                    file_path: path.best_effort_path_display(),
                })?;
            }
        }
        res.1.as_str().try_into()
    }

    fn parse_filters<'y>(
        top_level: &LinkedHashMap<Yaml<'y>, Yaml<'y>>,
    ) -> Result<FilterConfig, ExplorerConfigError> {
        let defaults = FilterConfig::default();
        let filters = match lookup(top_level, "filters") {
            None | Some(Yaml::Value(Scalar::Null)) => return Ok(defaults),
            Some(value) => value
                .as_mapping()
                .context(InvalidValueSnafu {
                    key: "filters",
                    expected: "a map",
                })?,
        };

        let hide_by_name = match lookup(filters, "hide_by_name") {
            None | Some(Yaml::Value(Scalar::Null)) => defaults.hide_by_name,
            Some(value) => value
                .as_sequence()
                .context(InvalidValueSnafu {
                    key: "filters.hide_by_name",
                    expected: "a list of names",
                })?
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).context(InvalidValueSnafu {
                        key: "filters.hide_by_name",
                        expected: "a list of names",
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(FilterConfig {
            hide_dotfiles: bool_at(
                filters,
                "hide_dotfiles",
                "filters.hide_dotfiles",
                defaults.hide_dotfiles,
            )?,
            hide_by_name,
            hide_gitignored: bool_at(
                filters,
                "hide_gitignored",
                "filters.hide_gitignored",
                defaults.hide_gitignored,
            )?,
        })
    }
}

impl TryFrom<&str> for ExplorerConfig {
    type Error = ExplorerConfigError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let contents_vec = Yaml::load_from_str(contents)
            .map_err(|e| ExplorerConfigError::ParseError { source: e })?;
        let Some(contents) = contents_vec.first() else {
            debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        };

        let top_level = contents
            .as_mapping()
            .ok_or(ExplorerConfigError::TopLevelNotMap)?;

        let sort = match lookup(top_level, "sort") {
            None | Some(Yaml::Value(Scalar::Null)) => SortOrder::default(),
            Some(value) => {
                let name = value.as_str().context(InvalidValueSnafu {
                    key: "sort",
                    expected: "a sort order name",
                })?;
                SortOrder::from_name(name).context(UnknownSortOrderSnafu { name })?
            }
        };

        Ok(ExplorerConfig {
            sort,
            watch: bool_at(top_level, "watch", "watch", false)?,
            filters: Self::parse_filters(top_level)?,
        })
    }
}

fn lookup<'m, 'y>(
    map: &'m LinkedHashMap<Yaml<'y>, Yaml<'y>>,
    key: &'y str,
) -> Option<&'m Yaml<'y>> {
    map.get(&Yaml::Value(Scalar::String(Cow::Borrowed(key))))
}

fn bool_at<'y>(
    map: &LinkedHashMap<Yaml<'y>, Yaml<'y>>,
    key: &'y str,
    full_key: &'static str,
    default: bool,
) -> Result<bool, ExplorerConfigError> {
    match lookup(map, key) {
        None | Some(Yaml::Value(Scalar::Null)) => Ok(default),
        Some(Yaml::Value(Scalar::Boolean(value))) => Ok(*value),
        Some(_) => InvalidValueSnafu {
            key: full_key,
            expected: "true or false",
        }
        .fail(),
    }
}

#[derive(Debug, Snafu)]
pub enum ExplorerConfigError {
    #[snafu(display("Failed to read the config file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to parse the config file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Top level of config should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Config key '{}' should be {}", key, expected))]
    InvalidValue { key: String, expected: String },
    #[snafu(display("Unknown sort order '{}'", name))]
    UnknownSortOrder { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[compio::test]
    async fn config_returns_error_on_nonexistent_file() {
        let result = ExplorerConfig::from_path(Path::new("nonexistent.yaml").to_path_buf()).await;
        assert!(matches!(result, Err(ExplorerConfigError::ReadError { .. })));
    }

    #[compio::test]
    async fn config_defaults_when_root_has_no_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExplorerConfig::read(dir.path()).await.unwrap();
        assert_eq!(config, ExplorerConfig::default());
        assert!(config.filters.hide_dotfiles);
        assert_eq!(config.filters.hide_by_name, vec![".git".to_string()]);
    }

    #[compio::test]
    async fn config_is_read_from_the_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "sort: type\nwatch: true\nfilters:\n  hide_dotfiles: false\n",
        )
        .unwrap();

        let config = ExplorerConfig::read(dir.path()).await.unwrap();

        assert_eq!(config.sort, SortOrder::ByType);
        assert!(config.watch);
        assert!(!config.filters.hide_dotfiles);
        assert_eq!(config.filters.hide_by_name, vec![".git".to_string()]);
    }

    #[compio::test]
    async fn config_returns_error_on_invalid_yaml() {
        let invalid_yaml = "invalid: yaml: content: [unclosed";
        let result: Result<ExplorerConfig, _> = invalid_yaml.try_into();
        assert!(matches!(result, Err(ExplorerConfigError::ParseError { .. })));
    }

    #[compio::test]
    async fn config_handles_empty_file() {
        let result: Result<ExplorerConfig, _> = "".try_into();
        assert_eq!(result.unwrap(), ExplorerConfig::default());
    }

    #[compio::test]
    async fn config_returns_error_when_top_level_is_not_map() {
        let yaml_with_list_top_level = "- item1\n- item2";
        let result: Result<ExplorerConfig, _> = yaml_with_list_top_level.try_into();
        assert!(matches!(result, Err(ExplorerConfigError::TopLevelNotMap)));
    }

    #[compio::test]
    async fn config_ignores_unknown_keys() {
        let yaml = "theme: dark\nwatch: true";
        let result: Result<ExplorerConfig, _> = yaml.try_into();
        assert!(result.unwrap().watch);
    }

    #[compio::test]
    async fn config_rejects_unknown_sort_order() {
        let result: Result<ExplorerConfig, _> = "sort: random".try_into();
        assert!(matches!(
            result,
            Err(ExplorerConfigError::UnknownSortOrder { .. })
        ));
    }

    #[compio::test]
    async fn config_rejects_wrongly_typed_values() {
        let not_bool: Result<ExplorerConfig, _> = "watch: often".try_into();
        let not_list: Result<ExplorerConfig, _> = "filters:\n  hide_by_name: target".try_into();
        let not_map: Result<ExplorerConfig, _> = "filters: [a]".try_into();

        assert!(matches!(
            not_bool,
            Err(ExplorerConfigError::InvalidValue { ref key, .. }) if key == "watch"
        ));
        assert!(matches!(
            not_list,
            Err(ExplorerConfigError::InvalidValue { ref key, .. }) if key == "filters.hide_by_name"
        ));
        assert!(matches!(
            not_map,
            Err(ExplorerConfigError::InvalidValue { ref key, .. }) if key == "filters"
        ));
    }

    #[compio::test]
    async fn config_reads_hidden_names() {
        let yaml = r#"
filters:
  hide_by_name:
    - target
    - node_modules
  hide_gitignored: true
"#;
        let config: ExplorerConfig = yaml.try_into().unwrap();

        assert_eq!(
            config.filters.hide_by_name,
            vec!["target".to_string(), "node_modules".to_string()]
        );
        assert!(config.filters.hide_gitignored);
        let filter = config.filters.entry_filter();
        assert!(!filter.accepts(&crate::filesystem::DirEntry::new(
            "target",
            crate::tree::EntryKind::Directory
        )));
    }
}
