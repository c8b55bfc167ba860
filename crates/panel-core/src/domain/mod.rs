//! Domain entities for the panel protocol.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" here? (for beginners)
//!
//! The one domain concept the bridge cannot live without is *who is on the
//! other end of the channel*.  A panel is untrusted content running inside
//! somebody else's page, and the page that embeds it may itself be hostile.
//! Trust is established purely at the application layer by comparing origins,
//! so the origin type and its matching rules live here, free of any I/O.

/// Origin identities and matching rules.
///
/// See [`origin::Origin`] for the main type.
pub mod origin;
