//! Core data types for dependencies, vulnerabilities, and scan results.
//!
//! - [`Ecosystem`] - The package namespace a dependency lives in
//! - [`ManifestFile`] - A raw `{path, content}` input record
//! - [`PackageInfo`] - One dependency declared by a manifest
//! - [`Severity`] - Normalized four-level severity (plus `Unknown`)
//! - [`NormalizedVulnerability`] - A vulnerability joined with its package
//! - [`ScanResult`] - Complete scan results
//!
//! # Example
//!
//! ```
//! use depscan::{Ecosystem, PackageInfo, ScanResult};
//!
//! let package = PackageInfo::new("lodash", "4.17.21", Ecosystem::Npm, "package.json");
//! let result = ScanResult::completed(Vec::new(), 1, 1);
//!
//! assert_eq!(package.key(), "npm:lodash@4.17.21");
//! assert!(result.success);
//! ```

mod package;
mod vulnerability;

pub use package::*;
pub use vulnerability::*;
