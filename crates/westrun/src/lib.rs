//! # Westrun
//!
//! Exposes westpack protocol objects over a message-oriented transport.
//!
//! A peer opens a session, receives the root object (the registry) plus one
//! advertisement per global interface, and from then on sends binary frames that
//! create, invoke, and destroy server-side resources addressed by small integer ids.
//!
//! ## Architecture
//!
//! - **Registry**: one per connection. Allocates ids from its own counter and owns every
//!   resource of that connection. Nothing is shared between connections.
//! - **Connection**: binds one transport session to one registry, dispatches inbound
//!   messages in arrival order, and tears everything down on the first violation.
//! - **Server**: the session table the transport adapter talks to. Each connection is
//!   driven by its own task, so connections never wait on each other.
//!
//! ## Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use westrun::*;
//! # async fn example(session: Arc<dyn Session>) -> anyhow::Result<()> {
//! let seat = Interface::builder("seat", 1)
//!     .request("release", &[], |ctx, _args| {
//!         let id = ctx.object();
//!         ctx.destroy(id)?;
//!         Ok(())
//!     })
//!     .build()?;
//!
//! let server = Server::new(Globals::new().with(seat));
//! server.on_open(session).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod global;
pub mod interface;
pub mod mock_session;
pub mod registry;
pub mod resource;
pub mod server;
pub mod session;

pub use config::Config;
pub use mock_session::MockPeer;
pub use mock_session::MockSession;
pub use connection::Connection;
pub use connection::ConnectionState;
pub use context::Context;
pub use error::Error;
pub use error::Result;
pub use global::Global;
pub use global::Globals;
pub use interface::Handler;
pub use interface::Interface;
pub use interface::InterfaceBuilder;
pub use interface::Request;
pub use registry::Registry;
pub use resource::Resource;
pub use server::Server;
pub use session::CloseCode;
pub use session::CloseReason;
pub use session::Payload;
pub use session::Session;
pub use session::SessionId;
pub use session::TransportError;

pub use westpack::Arg;
pub use westpack::ArgKind;
pub use westpack::Fd;
pub use westpack::Fixed;
pub use westpack::Message;
pub use westpack::ObjectId;
pub use westpack::Packet;
