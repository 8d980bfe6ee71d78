//! # Object Registry
//!
//! The per-connection authority for object ids and the resources bound to them.
//!
//! ## Invariants
//! - Every key in the resource map equals that resource's own id.
//! - `next_id` is strictly greater than every id ever allocated or bound on this
//!   registry. Ids are never reused, even after their resource is destroyed.
//! - The counter is a plain field. One registry belongs to one connection, so it is
//!   only ever mutated from that connection's processing context.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use westpack::Arg;
use westpack::Message;
use westpack::ObjectId;

use crate::error::Error;
use crate::error::Result;
use crate::global::Globals;
use crate::interface::Interface;
use crate::resource::Resource;
use crate::session::SessionId;

/// Event on the root object announcing a global: `[new_id, string name, uint version]`.
pub const GLOBAL_EVENT: u16 = 0;

/// Event on the root object reporting a fatal error: `[object, uint code, string message]`.
pub const ERROR_EVENT: u16 = 1;

/// The resource table of one connection.
#[derive(Debug)]
pub struct Registry {
    client: SessionId,
    next_id: u32,
    resources: HashMap<ObjectId, Resource>,
    published: bool,
}

impl Registry {
    /// Creates a registry with the root resource bound to `ObjectId::ROOT`.
    pub fn new(client: SessionId) -> Self {
        let mut resources = HashMap::new();
        let root = Resource::new(ObjectId::ROOT, Interface::root(), client);
        resources.insert(ObjectId::ROOT, root);

        Self {
            client,
            next_id: ObjectId::ROOT.0 + 1,
            resources,
            published: false,
        }
    }

    pub fn client(&self) -> SessionId {
        self.client
    }

    /// The id the next `create_resource` will hand out.
    pub fn next_id(&self) -> ObjectId {
        ObjectId(self.next_id)
    }

    /// Allocates a fresh id and binds a new resource of `interface` to it.
    pub fn create_resource(&mut self, interface: Arc<Interface>) -> Result<ObjectId> {
        let id = ObjectId(self.next_id);
        self.next_id = self.next_id.checked_add(1).ok_or(Error::IdsExhausted)?;
        self.insert(id, interface);
        Ok(id)
    }

    /// Binds a peer-chosen id from a `new_id` argument.
    ///
    /// Only ids at or above the counter are accepted. Anything lower was already
    /// handed out once on this connection.
    pub fn bind_new_id(&mut self, id: ObjectId, interface: Arc<Interface>) -> Result<()> {
        if id.0 < self.next_id {
            return Err(Error::InvalidNewId { id, next: self.next_id() });
        }
        self.next_id = id.0.checked_add(1).ok_or(Error::IdsExhausted)?;
        self.insert(id, interface);
        Ok(())
    }

    fn insert(&mut self, id: ObjectId, interface: Arc<Interface>) {
        debug!(client = %self.client, object = %id, interface = interface.name(), "resource created");
        self.resources.insert(id, Resource::new(id, interface, self.client));
    }

    pub fn lookup(&self, id: ObjectId) -> Result<&Resource> {
        self.resources.get(&id).ok_or(Error::UnknownObject(id))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.resources.contains_key(&id)
    }

    pub fn root(&self) -> Result<&Resource> {
        self.lookup(ObjectId::ROOT)
    }

    /// Removes a resource. Its id stays retired.
    pub fn destroy(&mut self, id: ObjectId) -> Result<Resource> {
        if id == ObjectId::ROOT {
            return Err(Error::RootObject);
        }
        let resource = self.resources.remove(&id).ok_or(Error::UnknownObject(id))?;
        debug!(client = %self.client, object = %id, "resource destroyed");
        Ok(resource)
    }

    /// Number of live resources, the root included.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.resources.keys().copied()
    }

    /// Announces every global to the peer, each bound to a freshly allocated id.
    ///
    /// Queues one `GLOBAL_EVENT` per global on the root object and returns how many
    /// were queued. May only run once per registry.
    pub fn publish_globals(&mut self, globals: &Globals, outbox: &mut Vec<Message>) -> Result<usize> {
        if self.published {
            return Err(Error::AlreadyPublished);
        }
        self.root()?;
        self.published = true;

        for global in globals.iter() {
            let interface = global.interface().clone();
            let name = interface.name().to_string();
            let version = interface.version();
            let id = self.create_resource(interface)?;

            outbox.push(Message::new(
                ObjectId::ROOT,
                GLOBAL_EVENT,
                vec![Arg::NewId(id), Arg::String(name), Arg::Uint(version)],
            ));
        }

        Ok(globals.len())
    }

    /// Drops every resource, the root included. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.resources.len();
        self.resources.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str) -> Arc<Interface> {
        Interface::builder(name, 1).build().unwrap()
    }

    #[test]
    fn root_is_reserved() {
        let registry = Registry::new(SessionId(1));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.root().unwrap().interface().name(), "registry");
        assert_eq!(registry.next_id(), ObjectId(1));
    }

    #[test]
    fn ids_increase_strictly() {
        let mut registry = Registry::new(SessionId(1));
        let a = registry.create_resource(iface("a")).unwrap();
        let b = registry.create_resource(iface("b")).unwrap();
        let c = registry.create_resource(iface("c")).unwrap();
        assert_eq!((a, b, c), (ObjectId(1), ObjectId(2), ObjectId(3)));
    }

    #[test]
    fn lookup_returns_the_created_resource() {
        let mut registry = Registry::new(SessionId(7));
        let id = registry.create_resource(iface("output")).unwrap();

        let resource = registry.lookup(id).unwrap();
        assert_eq!(resource.id(), id);
        assert_eq!(resource.interface().name(), "output");
        assert_eq!(resource.client(), SessionId(7));
    }

    #[test]
    fn destroyed_ids_are_gone_and_not_reused() {
        let mut registry = Registry::new(SessionId(1));
        let id = registry.create_resource(iface("buffer")).unwrap();
        registry.destroy(id).unwrap();

        assert!(matches!(registry.lookup(id), Err(Error::UnknownObject(x)) if x == id));
        assert!(matches!(registry.destroy(id), Err(Error::UnknownObject(_))));

        let next = registry.create_resource(iface("buffer")).unwrap();
        assert!(next > id);
    }

    #[test]
    fn root_cannot_be_destroyed() {
        let mut registry = Registry::new(SessionId(1));
        assert!(matches!(registry.destroy(ObjectId::ROOT), Err(Error::RootObject)));
        assert!(registry.contains(ObjectId::ROOT));
    }

    #[test]
    fn bind_new_id_advances_counter() {
        let mut registry = Registry::new(SessionId(1));
        registry.bind_new_id(ObjectId(10), iface("region")).unwrap();
        assert_eq!(registry.next_id(), ObjectId(11));

        let created = registry.create_resource(iface("region")).unwrap();
        assert_eq!(created, ObjectId(11));
    }

    #[test]
    fn bind_new_id_rejects_taken_ids() {
        let mut registry = Registry::new(SessionId(1));
        let id = registry.create_resource(iface("a")).unwrap();
        registry.destroy(id).unwrap();

        // destroyed but retired
        assert!(matches!(
            registry.bind_new_id(id, iface("a")),
            Err(Error::InvalidNewId { .. })
        ));
        assert!(matches!(
            registry.bind_new_id(ObjectId::ROOT, iface("a")),
            Err(Error::InvalidNewId { .. })
        ));
    }

    #[test]
    fn counter_never_wraps() {
        let mut registry = Registry::new(SessionId(1));
        registry.bind_new_id(ObjectId(u32::MAX - 1), iface("a")).unwrap();
        assert!(matches!(registry.create_resource(iface("b")), Err(Error::IdsExhausted)));
    }

    #[test]
    fn publish_globals_announces_each_once() {
        let mut registry = Registry::new(SessionId(1));
        let globals = Globals::new().with(iface("compositor")).with(iface("seat"));
        let mut outbox = Vec::new();

        let count = registry.publish_globals(&globals, &mut outbox).unwrap();
        assert_eq!(count, 2);
        assert_eq!(outbox.len(), 2);

        assert_eq!(outbox[0].target, ObjectId::ROOT);
        assert_eq!(outbox[0].opcode, GLOBAL_EVENT);
        assert_eq!(
            outbox[0].args,
            vec![Arg::NewId(ObjectId(1)), Arg::from("compositor"), Arg::Uint(1)]
        );
        assert_eq!(outbox[1].args[0], Arg::NewId(ObjectId(2)));
        assert_eq!(registry.lookup(ObjectId(2)).unwrap().interface().name(), "seat");

        let again = registry.publish_globals(&globals, &mut outbox);
        assert!(matches!(again, Err(Error::AlreadyPublished)));
        assert_eq!(outbox.len(), 2);
    }

    #[test]
    fn clear_drops_everything_once() {
        let mut registry = Registry::new(SessionId(1));
        registry.create_resource(iface("a")).unwrap();
        registry.create_resource(iface("b")).unwrap();

        assert_eq!(registry.clear(), 3);
        assert_eq!(registry.clear(), 0);
        assert!(registry.is_empty());
    }
}
