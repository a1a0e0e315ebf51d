use std::cmp::Ordering;

use derive_more::Display;

use super::Node;

/// Total order over siblings.
pub trait Comparator {
    fn compare(&self, a: &Node, b: &Node) -> Ordering;
}

impl<F> Comparator for F
where
    F: Fn(&Node, &Node) -> Ordering,
{
    fn compare(&self, a: &Node, b: &Node) -> Ordering {
        self(a, b)
    }
}

/// Containers before leaves, then case-insensitive name.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoriesFirst;

impl Comparator for DirectoriesFirst {
    fn compare(&self, a: &Node, b: &Node) -> Ordering {
        containers_first(a, b).then_with(|| by_name(a, b))
    }
}

/// Containers before leaves, then by extension, then by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByType;

impl Comparator for ByType {
    fn compare(&self, a: &Node, b: &Node) -> Ordering {
        containers_first(a, b)
            .then_with(|| {
                let ext_a = a.extension().map(str::to_lowercase);
                let ext_b = b.extension().map(str::to_lowercase);
                ext_a.cmp(&ext_b)
            })
            .then_with(|| by_name(a, b))
    }
}

fn containers_first(a: &Node, b: &Node) -> Ordering {
    b.is_container().cmp(&a.is_container())
}

// Exact name and path break ties so that the order stays total.
fn by_name(a: &Node, b: &Node) -> Ordering {
    a.name()
        .to_lowercase()
        .cmp(&b.name().to_lowercase())
        .then_with(|| a.name().cmp(b.name()))
        .then_with(|| a.path().cmp(b.path()))
}

/// Named comparators selectable from configuration.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    #[display("directories_first")]
    DirectoriesFirst,
    #[display("type")]
    ByType,
}

impl SortOrder {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "directories_first" | "name" => Some(SortOrder::DirectoriesFirst),
            "type" | "extension" => Some(SortOrder::ByType),
            _ => None,
        }
    }

    pub fn comparator(self) -> Box<dyn Comparator> {
        match self {
            SortOrder::DirectoriesFirst => Box::new(DirectoriesFirst),
            SortOrder::ByType => Box::new(ByType),
        }
    }
}
