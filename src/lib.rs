//! # bigip - BIG-IP iControl REST core for Rust
//!
//! A blocking client core for the appliance's declarative REST configuration
//! API. It owns the parts every resource wrapper needs: authentication and
//! token lifecycle, partition-aware resource paths, generic CRUD with a typed
//! error model, and the chunked file transfer used for large artifacts.
//!
//! ## Features
//!
//! - Basic-auth and token sessions with transparent token renewal
//!   (on expiry, and once after a 401)
//! - `/Partition/Name` object names rendered as one `~Partition~Name` segment
//! - Errors classified as auth failure, not found, conflict, remote or
//!   transport failure
//! - Range-addressed chunked upload and download
//! - Deadlines and cancellation on every call
//!
//! ## Basic Usage
//!
//! ```no_run
//! use bigip::{CallContext, Config, IRule, Session};
//!
//! fn main() -> Result<(), bigip::BigIpError> {
//!     let config = Config::new("10.1.1.4", "admin", "secret").with_cert_verify_disable(true);
//!     let session = Session::token(config)?;
//!     let cx = CallContext::background();
//!
//!     match session.fetch::<IRule>(&cx, "/Common/redirect")? {
//!         Some(rule) => println!("{:?}", rule.rule),
//!         None => println!("no such rule"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Paths and raw CRUD
//!
//! ```no_run
//! use bigip::{CallContext, Config, Lookup, QueryOption, ResourcePath, Session};
//! use serde_json::{json, Value};
//!
//! let session = Session::basic(Config::new("10.1.1.4", "admin", "secret"))?;
//! let cx = CallContext::with_timeout(std::time::Duration::from_secs(30));
//!
//! let pools = ResourcePath::new("mgmt/tm/ltm/pool");
//! session.post(&cx, &pools, &json!({"name": "web", "partition": "Common"}))?;
//!
//! let web = pools.clone().name("/Common/web").query(QueryOption::ExpandSubcollections);
//! if let Lookup::Found(pool) = session.get_for_entity::<Value>(&cx, &web)? {
//!     println!("{}", pool["fullPath"]);
//! }
//! # Ok::<(), bigip::BigIpError>(())
//! ```
//!
//! ## File transfer
//!
//! ```no_run
//! use bigip::{CallContext, Config, Session};
//!
//! let session = Session::token(Config::new("10.1.1.4", "admin", "secret"))?;
//! let cx = CallContext::background();
//! session.write_file(&cx, b"when HTTP_REQUEST {}", "/var/tmp/rule.tcl")?;
//! let back = session.read_file(&cx, "/var/tmp/rule.tcl")?;
//! # Ok::<(), bigip::BigIpError>(())
//! ```

pub mod client;
pub mod context;
pub mod error;
pub mod ilx;
pub mod path;
pub mod resource;
pub mod response;
pub mod rest;
pub mod session;
pub mod time;
pub mod token;
pub mod transfer;

// Re-export main types for convenience
pub use client::Config;
pub use context::CallContext;
pub use tokio_util::sync::CancellationToken;
pub use error::{map_error, ApiError, BigIpError, ErrorKind, ErrorPatterns, Result};
pub use ilx::{ExtensionConfig, ExtensionFile, IlxFile, IlxWorkspace, WorkspaceConfig};
pub use path::{encode_name, QueryOption, ResourcePath};
pub use resource::{Collection, IRule, Resource};
pub use response::{Lookup, UploadStatus};
pub use session::Session;
pub use time::Micros;
pub use token::Token;
pub use transfer::{ChunkRange, FileTransfer, TransferProgressFn, TransferState};
