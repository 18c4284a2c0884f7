//! Execution targets

use std::fmt;

/// An addressable execution unit, e.g. a processor core
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    name: String,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Target { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
