//! Uniform access to credential stores.
//!
//! A [`Registry`] maps each [`BackendType`] to an opener; [`Registry::open`]
//! picks the first allowed backend that can be opened. Every backend speaks
//! the same [`Backend`] contract, so callers never depend on which one won.
//!
//! ```no_run
//! use keyring::{Config, Item, BackendType, fixed_string_prompt};
//!
//! let cfg = Config::new()
//!     .with_service_name("example")
//!     .with_backends([BackendType::File])
//!     .with_file_dir("~/.keyring-example")
//!     .with_file_password_func(fixed_string_prompt("no more secrets"));
//! let mut ring = keyring::open(&cfg)?;
//! ring.set(&Item::new("llamas", "llamas are great"))?;
//! assert_eq!(ring.get("llamas")?.data, b"llamas are great");
//! # Ok::<(), keyring::Error>(())
//! ```

pub mod backend;
pub mod config;
mod debug;
pub mod error;
pub mod registry;

pub use backend::file::FileBackend;
pub use backend::memory::MemoryBackend;
pub use backend::{Backend, BackendType, Item, Metadata};
pub use config::{Config, PromptFn, fixed_string_prompt, terminal_prompt};
pub use debug::{debug_enabled, set_debug};
pub use error::{Error, Result};
pub use registry::{Opener, Registry, available_backends, open};
