//! NoobHeaders Core Library
//!
//! This crate holds the profile model and the pure decision logic of the
//! NoobHeaders header modifier: which filters match a URL, which profile a
//! navigation should switch to, and how many headers apply to a page.
//!
//! # Architecture
//!
//! A configuration is a list of profiles, an active profile id and a global
//! enable flag. Nothing here reads ambient state: every function receives the
//! configuration it works on, and nothing here performs I/O.
//!
//! # Modules
//!
//! - `types`: Profile, header, filter and store document types
//! - `url`: Hostname extraction and glob compilation
//! - `matcher`: Domain and URL-pattern filter matching
//! - `detect`: Filter kind detection from raw values
//! - `select`: Auto-switch selection and badge counting
//! - `profiles`: Profile editing operations
//! - `transfer`: Import/export of profile lists

pub mod types;
pub mod url;
pub mod matcher;
pub mod detect;
pub mod select;
pub mod profiles;
pub mod transfer;

// Re-export commonly used types
pub use detect::detect_filter_type;
pub use matcher::{is_valid_domain, matches};
pub use profiles::ProfileError;
pub use select::{badge_count, count_applicable, contributing_profiles, select_profile_for_url};
pub use transfer::{export_profiles, import_profiles, ImportError};
pub use types::{Filter, FilterKind, GlobalConfig, Header, HeaderKind, Profile, StorageKey};
