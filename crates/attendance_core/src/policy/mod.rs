//! Role-based access rules for attendance records and profiles.
//!
//! # Responsibility
//! - Decide which operations a caller may perform, by role.
//! - Decide which rows a caller may see when a query is built.
//! - Provide object-level owner-or-admin checks.
//!
//! # Invariants
//! - Role dispatch lives here only; services never branch on roles directly.
//! - Objects without a participant owner are denied to participants.
//! - Rows outside a caller's scope surface as not-found, never forbidden.

pub mod access;
