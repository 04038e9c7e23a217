//! Read-side geographic resolution.
//!
//! All lookups are synchronous and read-only against the stores, so a
//! single instance can be shared across threads behind an `Arc`.

pub mod locator;
pub mod metro;
pub mod proximity;
pub mod records;
pub mod validator;

pub use locator::{repair_point, AdminContext, AdminUnit, BoundaryLocator, CONTAINMENT_LIMIT};
pub use metro::{MetroResolver, MetroStats};
pub use proximity::{ProximityHit, ProximityIndex, ProximityQuery};
pub use validator::CoordinateValidator;
