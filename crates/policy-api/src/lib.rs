//! Policy API support
//!
//! The pieces a request handler needs in front of the policy store:
//!
//! - `mapper`: JSON payloads to and from store policies and tags
//! - `validator`: payload rules (ids, protocol, port and IP ranges)
//! - `guard`: who may write which policies
//! - `errors`: client/server classification of failures

pub mod errors;
pub mod guard;
pub mod mapper;
pub mod models;
pub mod validator;

pub use errors::{classify, classify_mapper, ErrorClass};
pub use guard::{scopes, ClientError, GuardError, IdentityClient, PolicyGuard, Space, SpaceClient, TokenInfo};
pub use mapper::{map_store_tag, map_store_tags, MapperError, PolicyMapper};
pub use models::{EgressPolicy, Policies, PolicyCollection, Tag, Tags};
pub use validator::{PolicyValidator, Validate, ValidationError};
