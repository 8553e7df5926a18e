//! student-registry: an in-memory student registry served over TCP.
//!
//! Components, leaf-first:
//! - [`student`]: validated student records and their derived properties
//! - [`repository`]: the thread-safe store shared by every connection
//! - [`codec`]: JSON encoding of records for response payloads
//! - [`protocol`]: the pipe-delimited request/response line grammar
//! - [`dispatch`]: maps commands onto repository queries
//! - [`handler`]: the per-connection read/dispatch/write loop
//! - [`server`]: listener, accept loop, bounded connection pool, shutdown
//! - [`client`]: one-connection-per-request client and interactive loop
//!
//! Configuration for both binaries lives in [`config`]; the error enums in
//! [`error`].

pub mod client;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod repository;
pub mod sample;
pub mod server;
pub mod student;

pub use client::Client;
pub use protocol::{Command, Response};
pub use repository::Repository;
pub use server::{RunningServer, Server};
pub use student::{NewStudent, Student};
