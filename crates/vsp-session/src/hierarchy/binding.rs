//! Per-node link and parent slots
//!
//! Every hierarchy node holds a clone of the session link and a weak
//! reference to its owning module. Disconnecting clears both; it never
//! comes back.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use vsp_core::{VspError, VspResult};
use vsp_transport::Link;

use crate::hierarchy::Module;

#[derive(Debug)]
pub(crate) struct Binding {
    link: RwLock<Option<Link>>,
    parent: RwLock<Weak<Module>>,
}

impl Binding {
    pub fn new(link: &Link, parent: Weak<Module>) -> Self {
        Binding {
            link: RwLock::new(Some(link.clone())),
            parent: RwLock::new(parent),
        }
    }

    /// Link for a request on behalf of `path`
    pub fn link(&self, path: &str) -> VspResult<Link> {
        self.link
            .read()
            .clone()
            .ok_or_else(|| VspError::Disconnected(path.to_string()))
    }

    pub fn parent(&self) -> Option<Arc<Module>> {
        self.parent.read().upgrade()
    }

    pub fn is_connected(&self) -> bool {
        self.link.read().is_some()
    }

    pub fn clear(&self) {
        *self.link.write() = None;
        *self.parent.write() = Weak::new();
    }
}
