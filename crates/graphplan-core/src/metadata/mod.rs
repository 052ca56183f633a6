//! Entity type metadata.
//!
//! [`TypeMetadata`] is built once from statically registered
//! [`TypeDescriptor`]s and answers column, key, subtype and join-key
//! questions for the planner and the materializer.

mod descriptor;
mod link;
mod member;
mod registry;
mod resolve;
mod types;

pub use descriptor::TypeDescriptor;
pub use link::{JoinKeys, JoinOverride, LinkTable};
pub use member::{MemberDef, MemberKind};
pub use registry::{TypeColumn, TypeMetadata};
pub use types::ScalarType;
