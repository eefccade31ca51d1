//! Manifest-driven tools for tether.
//!
//! Each tool is an external binary described by a `tool.json` manifest.
//! [`ManifestRegistry`] discovers manifests, advertises one definition per
//! command, and runs calls as subprocesses under a timeout.

pub mod argv;
pub mod manifest;
pub mod registry;

pub use manifest::{CommandDef, ParameterDef, ToolManifest};
pub use registry::{ManifestRegistry, UnknownPlaceholder};
