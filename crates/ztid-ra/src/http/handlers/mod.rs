//! HTTP request handlers.

mod crl;
mod enrollment;
mod health;
mod revocation;

pub use crl::{get_crl, CrlPublisher, PKIX_CRL_CONTENT_TYPE};
pub use enrollment::{issue, register};
pub use health::{health_check, metrics};
pub use revocation::{revoke, status};
