mod acl;
mod hmac;
mod session;

pub use acl::{AclMiddlewareFactory, AclMiddlewareService};
pub use hmac::{HmacMiddlewareFactory, HmacMiddlewareService, HMAC_HEADER};
pub use session::{SessionMiddlewareFactory, SessionMiddlewareService};
