//! Package updater built on the capcall dispatcher.
//!
//! The catalogue of known packages is exposed through three tools
//! (`list_packages`, `update_package`, `install_package`) whose scripts run
//! under the invocation's cancellation token.

#![warn(missing_docs, clippy::pedantic)]

pub mod catalogue;
pub mod runner;
pub mod selection;
pub mod summary;
pub mod tools;

pub use catalogue::{Catalogue, Package, Source};
pub use runner::{CommandOutput, CommandRunner, ShellRunner};
pub use tools::{INSTALL_PACKAGE, LIST_PACKAGES, PackageState, UPDATE_PACKAGE, register_tools};
