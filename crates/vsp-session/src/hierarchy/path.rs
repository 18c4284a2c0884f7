//! Dotted-path addressing

use std::sync::Arc;

use crate::hierarchy::Module;

/// Separator between hierarchy levels
pub const PATH_SEPARATOR: char = '.';

/// Anything that can be split into hierarchy path segments
pub trait PathSegments {
    fn segments(&self) -> Vec<&str>;
}

impl PathSegments for str {
    fn segments(&self) -> Vec<&str> {
        self.split(PATH_SEPARATOR).collect()
    }
}

impl PathSegments for String {
    fn segments(&self) -> Vec<&str> {
        self.as_str().segments()
    }
}

impl<'a> PathSegments for [&'a str] {
    fn segments(&self) -> Vec<&str> {
        self.to_vec()
    }
}

impl<'a> PathSegments for Vec<&'a str> {
    fn segments(&self) -> Vec<&str> {
        self.clone()
    }
}

/// Walk `segments` down from `modules`, exact names only
pub(crate) fn find_module_in(modules: &[Arc<Module>], segments: &[&str]) -> Option<Arc<Module>> {
    let (first, rest) = segments.split_first()?;
    let module = modules.iter().find(|m| m.name() == *first)?;
    if rest.is_empty() {
        Some(Arc::clone(module))
    } else {
        find_module_in(module.modules(), rest)
    }
}

/// Split off the leaf name; `None` for an empty path
pub(crate) fn split_leaf<'p, 's>(segments: &'p [&'s str]) -> Option<(&'p [&'s str], &'s str)> {
    let (leaf, parents) = segments.split_last()?;
    Some((parents, *leaf))
}
