//! Domain model for identities, role profiles and attendance records.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own record-level validation and derived attendance metrics.
//!
//! # Invariants
//! - Every identity is identified by a stable `IdentityId`.
//! - Role profiles are keyed by the owning identity id (strict one-to-one).
//! - Attendance hours are decimals with at most two fractional digits.

pub mod attendance;
pub mod clock;
pub mod identity;
pub mod metrics;
pub mod profile;
