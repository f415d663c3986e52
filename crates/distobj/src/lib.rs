// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client-side distributed object repository.
//!
//! Mirrors server-owned objects locally: an authoritative peer generates,
//! updates, disables and deletes objects over an ordered message stream, and
//! the repository keeps live objects in a table and recently disabled ones in
//! a bounded retention cache so a later generate can revive them.
//!
//! # Features
//!
//! - **Class registry**: numeric class ids and names mapped to field layouts
//!   and explicitly registered constructors
//! - **Lifecycle dispatch**: the generate/disable/delete/update state machine
//! - **Retention cache**: FIFO-bounded store of disabled objects
//! - **Transports**: in-process queue and tokio TCP with length-prefixed frames
//!
//! # Quick Start
//!
//! ```bash
//! # Check a class schema
//! distobj validate-schema classes.toml
//!
//! # Connect to a server and mirror its objects
//! distobj run --config distobj.toml
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! server_host = "127.0.0.1"
//! server_port = 7199
//! schema_path = "classes.toml"
//! cache_capacity = 10
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod object;
pub mod protocol;
pub mod pump;
pub mod registry;
pub mod schema;
pub mod table;
pub mod transport;

pub use cache::{CacheStats, CacheStatsSnapshot, RetentionCache};
pub use codec::{AppliedFields, DecodeError, DecodedField, EncodeError, FieldValue};
pub use config::{ConfigError, RepositoryConfig};
pub use dispatcher::{DispatchError, LifecycleDispatcher, ObjectState, ProtocolViolation};
pub use object::{ClassId, DistributedObject, FieldObject, ObjectId};
pub use pump::{MessagePump, PumpStats, PumpStatsSnapshot};
pub use registry::{
    ClassDescriptor, ClassDescriptorRegistry, FieldDef, FieldKind, RegistryBuilder, RegistryError,
};
pub use schema::{load_schema, parse_schema, ClassDefinition, SchemaError};
pub use table::{LiveEntry, ObjectTable, TableError};
pub use transport::{QueueTransport, TcpTransport, Transport, TransportError};
