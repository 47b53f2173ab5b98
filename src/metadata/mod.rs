//! Metadata reading and the loaded module model.
//!
//! The low-level readers ([`cor20header`], [`root`], [`streams`], [`tables`],
//! [`signatures`], [`method`]) follow ECMA-335 partition II closely. The loader combines
//! them into a [`cilmodule::CilModule`], whose members are described in [`members`]. The
//! analysis only sees the module through [`container::CodeContainer`], which
//! [`builder::ModuleBuilder`]-built modules implement as well.
//!
//! # Examples
//!
//! ```rust,no_run
//! use vmscope::{CilModule, CodeContainer};
//!
//! let module = CilModule::from_file("protected.exe".as_ref())?;
//! println!("Module: {}", module.name());
//! for method in module.methods_with_bodies() {
//!     let instructions = module.method_instructions(method).map(<[_]>::len).unwrap_or(0);
//!     println!("{:?}: {} instructions", module.method_name(method), instructions);
//! }
//! # Ok::<(), vmscope::Error>(())
//! ```

/// Assembling modules from typed parts
pub mod builder;
/// The loaded module
pub mod cilmodule;
/// The interface the analysis reads binaries through
pub mod container;
/// The CLI header
pub mod cor20header;
/// Resolved types, methods, fields and references
pub mod members;
/// Method attributes and body headers
pub mod method;
/// The metadata root
pub mod root;
/// Method and field signatures
pub mod signatures;
/// Metadata streams and heaps
pub mod streams;
/// Metadata tables
pub mod tables;
/// Metadata tokens
pub mod token;

mod loader;
