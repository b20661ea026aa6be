// src/lib.rs

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod harness;
pub mod model;
pub mod report;
pub mod validator;

/// The public prelude for the `nila-cc-verify` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::client::AuthServerClient;
    pub use crate::config::{Config, ConfigBuilder, FileConfig, ValidationDetails};
    pub use crate::error::{ErrorCategory, NilaVerifyError};
    pub use crate::harness::{run, RunSummary, Step, StepFailure};
    pub use crate::model::{JsonWebKey, JsonWebKeySet, TokenResponse};
    pub use crate::report::Reporter;
    pub use crate::validator::{Audience, Claims, Validator, VerifiedToken};
    pub use jsonwebtoken::Algorithm;
}
