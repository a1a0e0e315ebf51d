use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use futures::StreamExt;
use sidetree::config::{ExplorerConfig, ExplorerConfigError};
use sidetree::engine::{BufferState, Engine, OpenBuffers};
use sidetree::filesystem::{LocalFilesystem, NoopWatchService, NotifyWatchService, WatchService};
use sidetree::repository::{Repository, RepositoryRegistry, StatusSnapshot};
use sidetree::scheduler::{CompioHost, offload};
use sidetree::tree::TreeError;
use sidetree::views::{BuffersView, FilesystemView, GitStatusView, SearchOutcome, SearchView};
use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::application::data::ViewKind;
use crate::application::{OutlineRenderer, RuntimeConfig};

pub struct Application;

impl Application {
    pub async fn run(app_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();
        let config = ExplorerConfig::read(&app_config.root)
            .await
            .context(ExplorerConfigSnafu)?;
        debug!("Loaded config: {:?}", config);

        let status = Self::read_status(&app_config).await?;
        if config.filters.hide_gitignored && status.is_none() {
            warn!("filters.hide_gitignored needs --git-status to know what is ignored");
        }

        let renderer = OutlineRenderer::detect();
        match app_config.view {
            ViewKind::Filesystem if app_config.follows(&config) => {
                Self::follow_filesystem(&app_config, &config, status, renderer).await
            }
            ViewKind::Filesystem => {
                let engine = Self::engine(&config, NoopWatchService, false);
                let view = Self::filesystem_view(engine, &app_config, &config, status).await?;
                print!("{}", renderer.render(view.tree()));
                Ok(())
            }
            ViewKind::Search => Self::show_search(&app_config, &config, renderer).await,
            ViewKind::Buffers => Self::show_buffers(&app_config, &config, renderer).await,
            ViewKind::GitStatus => {
                let status = status.context(MissingGitStatusSnafu)?;
                Self::show_git_status(&app_config, &config, status, renderer).await
            }
        }
    }

    async fn read_status(
        app_config: &RuntimeConfig,
    ) -> Result<Option<StatusSnapshot>, ApplicationError> {
        let Some(path) = app_config.git_status.clone() else {
            return Ok(None);
        };
        let output = offload({
            let path = path.clone();
            move || std::fs::read_to_string(path)
        })
        .await
        .context(StatusFileSnafu { path })?;
        Ok(Some(StatusSnapshot::from_porcelain(&app_config.root, &output)))
    }

    fn engine<W: WatchService>(
        config: &ExplorerConfig,
        watcher: W,
        watching: bool,
    ) -> Engine<LocalFilesystem, W, CompioHost> {
        Engine::new(LocalFilesystem, watcher, CompioHost)
            .with_filter(config.filters.entry_filter())
            .with_watching(watching)
    }

    async fn filesystem_view<W: WatchService>(
        engine: Engine<LocalFilesystem, W, CompioHost>,
        app_config: &RuntimeConfig,
        config: &ExplorerConfig,
        status: Option<StatusSnapshot>,
    ) -> Result<FilesystemView<LocalFilesystem, W, CompioHost>, ApplicationError> {
        let mut view = FilesystemView::new(engine, &app_config.root)
            .with_sort_order(config.sort)
            .with_hide_ignored(config.filters.hide_gitignored);
        if let Some(status) = status {
            let mut repositories = RepositoryRegistry::new();
            repositories.register(status.toplevel());
            view = view.with_repositories(repositories);
            view.set_status_provider(Box::new(status));
        }
        view.open().await.context(OpenRootSnafu {
            root: app_config.root.clone(),
        })?;
        let expanded = view.expand_to_depth(app_config.depth).await;
        info!("Expanded {} directories", expanded);
        Ok(view)
    }

    async fn follow_filesystem(
        app_config: &RuntimeConfig,
        config: &ExplorerConfig,
        status: Option<StatusSnapshot>,
        renderer: OutlineRenderer,
    ) -> Result<(), ApplicationError> {
        let (watcher, mut events) = NotifyWatchService::new().context(WatchSnafu)?;
        let engine = Self::engine(config, watcher, true);
        let mut view = Self::filesystem_view(engine, app_config, config, status).await?;
        print!("{}", renderer.render(view.tree()));

        while let Some(event) = events.next().await {
            match view.handle_watch_event(&event).await {
                Ok(Some(summary)) => {
                    info!(
                        "{} changed: {} added, {} removed",
                        event.path.display(),
                        summary.added,
                        summary.removed
                    );
                    println!();
                    print!("{}", renderer.render(view.tree()));
                }
                Ok(None) => {}
                Err(error) => warn!("{}", error),
            }
        }
        Ok(())
    }

    async fn show_search(
        app_config: &RuntimeConfig,
        config: &ExplorerConfig,
        renderer: OutlineRenderer,
    ) -> Result<(), ApplicationError> {
        let outcome = match read_stdin_lines().await {
            Ok(lines) => SearchOutcome::Matches(
                lines
                    .iter()
                    .map(|line| resolve(&app_config.root, line))
                    .collect(),
            ),
            Err(error) => SearchOutcome::Failed(error.to_string()),
        };

        let engine = Self::engine(config, NoopWatchService, false);
        let mut view = SearchView::new(engine, &app_config.root);
        if let Err(message) = view.show(&app_config.root, outcome).await {
            eprintln!("search failed: {message}");
        }
        print!("{}", renderer.render(view.tree()));
        Ok(())
    }

    async fn show_buffers(
        app_config: &RuntimeConfig,
        config: &ExplorerConfig,
        renderer: OutlineRenderer,
    ) -> Result<(), ApplicationError> {
        let lines = read_stdin_lines().await.context(StdinSnafu)?;
        let buffers = lines
            .iter()
            .enumerate()
            .fold(OpenBuffers::new(), |buffers, (index, line)| {
                let (modified, path) = match line.strip_prefix('+') {
                    Some(rest) => (true, rest.trim()),
                    None => (false, line.as_str()),
                };
                buffers.with(
                    resolve(&app_config.root, path),
                    BufferState {
                        bufnr: u32::try_from(index + 1).ok(),
                        modified,
                    },
                )
            });

        let engine = Self::engine(config, NoopWatchService, false);
        let mut view = BuffersView::new(engine, &app_config.root);
        view.show(buffers).await;
        for path in view.outside_root() {
            eprintln!("not shown: {}", path.display());
        }
        print!("{}", renderer.render(view.tree()));
        Ok(())
    }

    async fn show_git_status(
        app_config: &RuntimeConfig,
        config: &ExplorerConfig,
        status: StatusSnapshot,
        renderer: OutlineRenderer,
    ) -> Result<(), ApplicationError> {
        let repo = Rc::new(Repository::new(status.toplevel()));
        let engine = Self::engine(config, NoopWatchService, false);
        let mut view = GitStatusView::new(engine, &app_config.root);
        view.show(&repo, &status).await;
        print!("{}", renderer.render(view.tree()));
        Ok(())
    }
}

async fn read_stdin_lines() -> io::Result<Vec<String>> {
    let contents = offload(|| io::read_to_string(io::stdin())).await?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn resolve(root: &Path, line: &str) -> PathBuf {
    let path = Path::new(line);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered during configuration stage"))]
    ExplorerConfigError { source: ExplorerConfigError },
    #[snafu(display("Could not open {}", root.display()))]
    OpenRootError { root: PathBuf, source: TreeError },
    #[snafu(display("Could not start watching for filesystem changes"))]
    WatchError { source: notify::Error },
    #[snafu(display("Could not read paths from stdin"))]
    StdinError { source: io::Error },
    #[snafu(display("Could not read git status from {}", path.display()))]
    StatusFileError { path: PathBuf, source: io::Error },
    #[snafu(display("The git-status view needs --git-status"))]
    MissingGitStatusError,
}
