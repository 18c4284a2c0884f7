//! Module nodes

use std::fmt;
use std::fmt::Write as _;
use std::sync::{Arc, Weak};

use vsp_core::VspResult;
use vsp_transport::Link;

use crate::hierarchy::binding::Binding;
use crate::hierarchy::path::{find_module_in, split_leaf, PathSegments, PATH_SEPARATOR};
use crate::hierarchy::{Attribute, Command, ModuleSpec};

/// A simulation component; owns its child modules, attributes and commands
#[derive(Debug)]
pub struct Module {
    name: String,
    kind: String,
    version: String,
    path: String,
    binding: Binding,
    modules: Vec<Arc<Module>>,
    attributes: Vec<Arc<Attribute>>,
    commands: Vec<Arc<Command>>,
}

impl Module {
    pub(crate) fn build(
        spec: &ModuleSpec,
        parent: Weak<Module>,
        parent_path: Option<&str>,
        link: &Link,
    ) -> Arc<Module> {
        let path = match parent_path {
            Some(p) => format!("{}{}{}", p, PATH_SEPARATOR, spec.name),
            None => spec.name.clone(),
        };

        Arc::new_cyclic(move |me: &Weak<Module>| {
            let modules = spec
                .modules
                .iter()
                .map(|m| Module::build(m, me.clone(), Some(&path), link))
                .collect();
            let attributes = spec
                .attributes
                .iter()
                .map(|a| Arc::new(Attribute::new(a, &path, me.clone(), link)))
                .collect();
            let commands = spec
                .commands
                .iter()
                .map(|c| Arc::new(Command::new(c, &path, me.clone(), link)))
                .collect();

            Module {
                name: spec.name.clone(),
                kind: spec.kind.clone(),
                version: spec.version.clone(),
                path,
                binding: Binding::new(link, parent),
                modules,
                attributes,
                commands,
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Dotted path from the hierarchy root
    pub fn hierarchy_name(&self) -> &str {
        &self.path
    }

    /// Owning module; `None` for roots and after disconnect
    pub fn parent(&self) -> Option<Arc<Module>> {
        self.binding.parent()
    }

    pub fn modules(&self) -> &[Arc<Module>] {
        &self.modules
    }

    pub fn attributes(&self) -> &[Arc<Attribute>] {
        &self.attributes
    }

    pub fn commands(&self) -> &[Arc<Command>] {
        &self.commands
    }

    pub fn is_connected(&self) -> bool {
        self.binding.is_connected()
    }

    /// Link used by this module's requests
    pub fn link(&self) -> VspResult<Link> {
        self.binding.link(&self.path)
    }

    /// Resolve a descendant module relative to this one
    pub fn find_module<P: PathSegments + ?Sized>(&self, path: &P) -> Option<Arc<Module>> {
        find_module_in(&self.modules, &path.segments())
    }

    /// Resolve an attribute; a single segment names one of this module's own
    pub fn find_attribute<P: PathSegments + ?Sized>(&self, path: &P) -> Option<Arc<Attribute>> {
        let segments = path.segments();
        let (parents, leaf) = split_leaf(&segments)?;
        if parents.is_empty() {
            return self.attributes.iter().find(|a| a.name() == leaf).cloned();
        }
        find_module_in(&self.modules, parents)?.find_attribute(leaf)
    }

    /// Resolve a command; a single segment names one of this module's own
    pub fn find_command<P: PathSegments + ?Sized>(&self, path: &P) -> Option<Arc<Command>> {
        let segments = path.segments();
        let (parents, leaf) = split_leaf(&segments)?;
        if parents.is_empty() {
            return self.commands.iter().find(|c| c.name() == leaf).cloned();
        }
        find_module_in(&self.modules, parents)?.find_command(leaf)
    }

    /// Depth-first teardown of this subtree
    pub fn disconnect(&self) {
        for module in &self.modules {
            module.disconnect();
        }
        for attribute in &self.attributes {
            attribute.disconnect();
        }
        for command in &self.commands {
            command.disconnect();
        }
        self.binding.clear();
    }

    /// Indented listing of this subtree: modules with kind, attributes with type
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_into(&mut out);
        out
    }

    fn describe_into(&self, out: &mut String) {
        let _ = writeln!(out, "{} ({})", self.path, self.kind);
        for attribute in &self.attributes {
            let _ = writeln!(out, "  {}: {}", attribute.name(), attribute.type_tag());
        }
        for module in &self.modules {
            module.describe_into(out);
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
