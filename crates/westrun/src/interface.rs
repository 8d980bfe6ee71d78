//! # Interfaces
//!
//! An interface is the dispatch table shared by every resource of one kind: a name,
//! a version, and one request per opcode. Opcodes are positions in the request list.
//!
//! ## Invariants
//! - A request whose signature takes a `new_id` always names the interface it creates.
//!   This is checked once in `InterfaceBuilder::build`, never on the hot path.

use std::sync::Arc;
use std::sync::OnceLock;

use westpack::Arg;
use westpack::ArgKind;

use crate::context::Context;
use crate::error::Error;
use crate::error::Result;

/// Name of the interface bound to the root object.
pub const ROOT_INTERFACE: &str = "registry";

/// A request handler. Runs synchronously inside the connection's processing of one message.
pub type Handler = Arc<dyn Fn(&mut Context<'_>, &[Arg]) -> anyhow::Result<()> + Send + Sync>;

/// One opcode of an interface.
#[derive(Clone)]
pub struct Request {
    name: String,
    signature: Vec<ArgKind>,
    creates: Option<Arc<Interface>>,
    handler: Handler,
}

impl Request {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &[ArgKind] {
        &self.signature
    }

    /// The interface bound to this request's `new_id` arguments.
    pub fn creates(&self) -> Option<&Arc<Interface>> {
        self.creates.as_ref()
    }

    pub(crate) fn invoke(&self, ctx: &mut Context<'_>, args: &[Arg]) -> anyhow::Result<()> {
        (self.handler)(ctx, args)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("creates", &self.creates.as_ref().map(|i| i.name()))
            .finish()
    }
}

/// The schema and dispatch table of one protocol interface.
#[derive(Debug)]
pub struct Interface {
    name: String,
    version: u32,
    requests: Vec<Request>,
}

impl Interface {
    pub fn builder(name: impl Into<String>, version: u32) -> InterfaceBuilder {
        InterfaceBuilder {
            name: name.into(),
            version,
            requests: Vec::new(),
        }
    }

    /// The interface of the root object. It accepts no requests.
    pub fn root() -> Arc<Interface> {
        static ROOT: OnceLock<Arc<Interface>> = OnceLock::new();
        ROOT.get_or_init(|| {
            Arc::new(Interface {
                name: ROOT_INTERFACE.to_string(),
                version: 1,
                requests: Vec::new(),
            })
        })
        .clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn request(&self, opcode: u16) -> Option<&Request> {
        self.requests.get(opcode as usize)
    }
}

/// Fluent builder for interfaces. Requests get opcodes in the order they are added.
pub struct InterfaceBuilder {
    name: String,
    version: u32,
    requests: Vec<Request>,
}

impl InterfaceBuilder {
    pub fn request<F>(mut self, name: impl Into<String>, signature: &[ArgKind], handler: F) -> Self
    where
        F: Fn(&mut Context<'_>, &[Arg]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.requests.push(Request {
            name: name.into(),
            signature: signature.to_vec(),
            creates: None,
            handler: Arc::new(handler),
        });
        self
    }

    /// Adds a request whose `new_id` arguments create resources of `creates`.
    pub fn constructor<F>(
        mut self,
        name: impl Into<String>,
        signature: &[ArgKind],
        creates: Arc<Interface>,
        handler: F,
    ) -> Self
    where
        F: Fn(&mut Context<'_>, &[Arg]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.requests.push(Request {
            name: name.into(),
            signature: signature.to_vec(),
            creates: Some(creates),
            handler: Arc::new(handler),
        });
        self
    }

    pub fn build(self) -> Result<Arc<Interface>> {
        for request in &self.requests {
            let takes_new_id = request.signature.contains(&ArgKind::NewId);
            if takes_new_id && request.creates.is_none() {
                return Err(Error::MissingNewIdInterface {
                    interface: self.name.clone(),
                    request: request.name.clone(),
                });
            }
        }

        Ok(Arc::new(Interface {
            name: self.name,
            version: self.version,
            requests: self.requests,
        }))
    }
}
