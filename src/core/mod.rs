// Core modules implementing bundling, the artifact format, and error modeling.
pub mod builder;
pub mod entry;
pub mod error;
pub mod format;
pub mod scan;
