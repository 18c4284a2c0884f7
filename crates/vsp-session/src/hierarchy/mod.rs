//! Component hierarchy of a running simulation
//!
//! The tree is built once from the hierarchy document fetched on connect.
//! Modules own their children; parents are only weakly referenced. A flat
//! list of targets sits beside the tree.

mod attribute;
mod binding;
mod command;
mod document;
mod module;
mod path;
mod target;

pub use attribute::*;
pub use command::*;
pub use document::*;
pub use module::*;
pub use path::{PathSegments, PATH_SEPARATOR};
pub use target::*;

use std::sync::{Arc, Weak};

use vsp_core::VspResult;
use vsp_transport::Link;

use path::{find_module_in, split_leaf};

/// Root of the module tree plus the session's targets
#[derive(Debug, Default)]
pub struct Hierarchy {
    modules: Vec<Arc<Module>>,
    targets: Vec<Target>,
}

impl Hierarchy {
    /// Materialize a validated document, binding every node to `link`
    pub fn build(document: &HierarchyDocument, link: &Link) -> Self {
        Hierarchy {
            modules: document
                .modules
                .iter()
                .map(|spec| Module::build(spec, Weak::new(), None, link))
                .collect(),
            targets: document.targets.iter().map(Target::new).collect(),
        }
    }

    /// Parse and build in one step
    pub fn parse(xml: &str, link: &Link) -> VspResult<Self> {
        Ok(Self::build(&HierarchyDocument::parse(xml)?, link))
    }

    /// Top-level modules
    pub fn modules(&self) -> &[Arc<Module>] {
        &self.modules
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn find_module<P: PathSegments + ?Sized>(&self, path: &P) -> Option<Arc<Module>> {
        find_module_in(&self.modules, &path.segments())
    }

    /// Attributes always live below a module, so a bare name never resolves here
    pub fn find_attribute<P: PathSegments + ?Sized>(&self, path: &P) -> Option<Arc<Attribute>> {
        let segments = path.segments();
        let (parents, leaf) = split_leaf(&segments)?;
        if parents.is_empty() {
            return None;
        }
        find_module_in(&self.modules, parents)?.find_attribute(leaf)
    }

    pub fn find_command<P: PathSegments + ?Sized>(&self, path: &P) -> Option<Arc<Command>> {
        let segments = path.segments();
        let (parents, leaf) = split_leaf(&segments)?;
        if parents.is_empty() {
            return None;
        }
        find_module_in(&self.modules, parents)?.find_command(leaf)
    }

    pub fn find_target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name() == name)
    }

    /// Cascade teardown through every module; idempotent
    pub fn disconnect(&self) {
        for module in &self.modules {
            module.disconnect();
        }
    }

    pub fn describe(&self) -> String {
        self.modules.iter().map(|m| m.describe()).collect()
    }
}
