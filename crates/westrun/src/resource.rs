//! Server-side protocol object instances.

use std::sync::Arc;

use westpack::ObjectId;

use crate::error::Error;
use crate::error::Result;
use crate::interface::Interface;
use crate::interface::Request;
use crate::session::SessionId;

/// One live protocol object.
///
/// Owned by its connection's `Registry` and never outlives it. The owning
/// connection is referenced by id, so there is no ownership cycle.
#[derive(Debug, Clone)]
pub struct Resource {
    id: ObjectId,
    interface: Arc<Interface>,
    client: SessionId,
}

impl Resource {
    pub(crate) fn new(id: ObjectId, interface: Arc<Interface>, client: SessionId) -> Self {
        Self { id, interface, client }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn interface(&self) -> &Arc<Interface> {
        &self.interface
    }

    /// The session of the connection that owns this resource.
    pub fn client(&self) -> SessionId {
        self.client
    }

    /// Resolves an opcode against this resource's dispatch table.
    pub fn request(&self, opcode: u16) -> Result<&Request> {
        self.interface.request(opcode).ok_or_else(|| Error::UnknownOpcode {
            object: self.id,
            interface: self.interface.name().to_string(),
            opcode,
        })
    }
}
