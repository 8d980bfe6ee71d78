//! Singleton interfaces advertised to every new connection.

use std::sync::Arc;

use crate::interface::Interface;

/// One advertised singleton.
#[derive(Debug, Clone)]
pub struct Global {
    interface: Arc<Interface>,
}

impl Global {
    pub fn new(interface: Arc<Interface>) -> Self {
        Self { interface }
    }

    pub fn interface(&self) -> &Arc<Interface> {
        &self.interface
    }
}

/// The ordered list of globals a server announces. Announcement order is insertion order.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    globals: Vec<Global>,
}

impl Globals {
    pub fn new() -> Self {
        Self { globals: Vec::new() }
    }

    pub fn add(&mut self, interface: Arc<Interface>) -> &mut Self {
        self.globals.push(Global::new(interface));
        self
    }

    pub fn with(mut self, interface: Arc<Interface>) -> Self {
        self.add(interface);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Global> {
        self.globals.iter()
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }
}
