use colored::{ColoredString, Colorize};
use sidetree::repository::StatusCode;
use sidetree::tree::{ClipboardStatus, Node, NodeVariant, Tree};
use supports_color::Stream;

/// Prints the visible part of a tree as an indented outline.
#[derive(Debug, Clone, Copy)]
pub struct OutlineRenderer;

impl OutlineRenderer {
    /// Turns coloring on only when stdout can show it.
    pub fn detect() -> Self {
        let enabled = supports_color::on(Stream::Stdout).is_some();
        colored::control::set_override(enabled);
        Self
    }

    pub fn render(&self, tree: &Tree) -> String {
        let mut out = String::new();
        for line in tree.outline() {
            let Some(node) = tree.get(line.id) else {
                continue;
            };
            out.push_str(&"  ".repeat(line.depth));
            out.push_str(&self.label(node, line.depth == 0));
            out.push('\n');
        }
        out
    }

    fn label(&self, node: &Node, is_root: bool) -> String {
        if let NodeVariant::Text { text } = node.variant() {
            return text.yellow().italic().to_string();
        }

        let mut label = String::new();
        if let Some(status) = node.git_status() {
            label.push_str(&format!("{} ", status_marker(status)));
        }

        let name = if is_root {
            node.path().display().to_string()
        } else {
            node.name().to_string()
        };
        let name = if node.is_container() {
            let marker = if node.is_expanded() || is_root { "▾" } else { "▸" };
            format!("{marker} {}", format!("{name}/").blue().bold())
        } else {
            name.normal().to_string()
        };
        let name = if node.is_ignored() {
            name.dimmed().to_string()
        } else {
            name
        };
        label.push_str(&name);

        if let Some(target) = node.link_target() {
            let arrow = format!(" -> {}", target.display());
            let arrow = if node.is_link_orphan() {
                arrow.red()
            } else {
                arrow.cyan()
            };
            label.push_str(&arrow.to_string());
        }
        if let NodeVariant::Buffer { bufnr: Some(bufnr) } = node.variant() {
            label.push_str(&format!(" #{bufnr}").dimmed().to_string());
        }
        if node.is_modified() {
            label.push_str(&" [+]".green().to_string());
        }
        match node.clipboard() {
            Some(ClipboardStatus::Copy) => label.push_str(" (copy)"),
            Some(ClipboardStatus::Cut) => label.push_str(" (cut)"),
            None => {}
        }
        label
    }
}

fn status_marker(status: StatusCode) -> ColoredString {
    let marker = status.to_string();
    match status {
        StatusCode::Conflict | StatusCode::Deleted => marker.red(),
        StatusCode::Modified => marker.yellow(),
        StatusCode::Added => marker.green(),
        StatusCode::Renamed | StatusCode::Untracked => marker.magenta(),
    }
}
