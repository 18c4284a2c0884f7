//! Module commands

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::debug;

use vsp_core::{VspError, VspResult};
use vsp_transport::Link;
use vsp_wire::compose;

use crate::hierarchy::binding::Binding;
use crate::hierarchy::path::PATH_SEPARATOR;
use crate::hierarchy::{CommandSpec, Module};

/// Wire verb for executing a module command
const EXECUTE: &str = "e";

/// An operation exposed by a module
#[derive(Debug)]
pub struct Command {
    name: String,
    argc: usize,
    desc: String,
    module_path: String,
    binding: Binding,
}

impl Command {
    pub(crate) fn new(spec: &CommandSpec, module_path: &str, parent: Weak<Module>, link: &Link) -> Self {
        Command {
            name: spec.name.clone(),
            argc: spec.argc,
            desc: spec.desc.clone(),
            module_path: module_path.to_string(),
            binding: Binding::new(link, parent),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Minimum number of arguments
    pub fn argc(&self) -> usize {
        self.argc
    }

    pub fn description(&self) -> &str {
        &self.desc
    }

    pub fn hierarchy_name(&self) -> String {
        format!("{}{}{}", self.module_path, PATH_SEPARATOR, self.name)
    }

    pub fn parent(&self) -> Option<Arc<Module>> {
        self.binding.parent()
    }

    pub fn is_connected(&self) -> bool {
        self.binding.is_connected()
    }

    /// Run the command; arguments beyond `argc` are passed through
    pub async fn execute<S: AsRef<str>>(&self, args: &[S]) -> VspResult<Vec<String>> {
        let link = self.binding.link(&self.hierarchy_name())?;
        if args.len() < self.argc {
            return Err(VspError::MissingArguments {
                command: self.name.clone(),
                required: self.argc,
                given: args.len(),
            });
        }

        let mut fields: Vec<&str> = vec![EXECUTE, self.module_path.as_str(), self.name.as_str()];
        fields.extend(args.iter().map(AsRef::as_ref));
        debug!(command = %self.hierarchy_name(), argc = args.len(), "execute");

        link.command(&compose(&fields)).await
    }

    pub(crate) fn disconnect(&self) {
        self.binding.clear();
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.module_path, PATH_SEPARATOR, self.name)
    }
}
