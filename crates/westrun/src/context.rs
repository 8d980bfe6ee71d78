//! What a request handler sees while it runs.

use std::sync::Arc;

use westpack::Arg;
use westpack::Message;
use westpack::ObjectId;

use crate::error::Result;
use crate::interface::Interface;
use crate::registry::Registry;
use crate::session::SessionId;

/// Per-message handler context.
///
/// Borrows the connection's registry and outbox for the duration of one dispatch.
/// Events posted here are flushed to the transport after the handler returns, in
/// the order they were posted.
pub struct Context<'a> {
    object: ObjectId,
    new_ids: &'a [ObjectId],
    registry: &'a mut Registry,
    outbox: &'a mut Vec<Message>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        object: ObjectId,
        new_ids: &'a [ObjectId],
        registry: &'a mut Registry,
        outbox: &'a mut Vec<Message>,
    ) -> Self {
        Self { object, new_ids, registry, outbox }
    }

    /// The object the request was addressed to.
    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn client(&self) -> SessionId {
        self.registry.client()
    }

    /// The id bound for the `index`-th `new_id` argument of this request.
    pub fn new_id(&self, index: usize) -> Option<ObjectId> {
        self.new_ids.get(index).copied()
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn create_resource(&mut self, interface: Arc<Interface>) -> Result<ObjectId> {
        self.registry.create_resource(interface)
    }

    pub fn destroy(&mut self, id: ObjectId) -> Result<()> {
        self.registry.destroy(id).map(|_| ())
    }

    /// Queues an event for the peer.
    pub fn post_event(&mut self, target: ObjectId, opcode: u16, args: Vec<Arg>) {
        self.outbox.push(Message::new(target, opcode, args));
    }
}
