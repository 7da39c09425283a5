//! # lmkd-client
//!
//! Free functions for talking to lmkd and for placing app processes into
//! per-process memory cgroups.
//!
//! Every call is synchronous and blocking. Descriptors returned by
//! [`connect`] belong to the caller; the other socket functions only
//! borrow them and never close them.
//!
//! ```ignore
//! use lmkd_client::{connect, register_process, update_props, UpdatePropsResult};
//! use lmkd_core::{ProcPrio, ProcType};
//!
//! let sock = connect()?;
//! register_process(&sock, &ProcPrio { pid, uid, oomadj: 900, ptype: ProcType::App })?;
//! match update_props(&sock) {
//!     UpdatePropsResult::Success => {}
//!     other => eprintln!("update props: {}", other),
//! }
//! ```

pub mod socket;
pub mod client;
pub mod memcg;

pub use socket::{connect, connect_to};
pub use client::{register_process, unregister_process, update_props, UpdatePropsResult};
pub use memcg::{create_memcg, detect_memcg_v2, memcg_apps_dir, using_memcg_v2};
