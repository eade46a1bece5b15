//! Registration authority service layer.

mod registration;

pub use registration::{RaSettings, RegistrationAuthority, RevokeTarget};
