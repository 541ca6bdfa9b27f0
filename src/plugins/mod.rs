//! Subsystems built on the core: day chains, timeline reconstruction, assets.

pub mod assets;
pub mod chain;
pub mod timeline;
