//! Core services: authorization guard, account flows, impersonation, the
//! two-factor state machine, and their persistence wrapper.

pub mod accounts;
pub mod audit;
pub mod authz;
pub mod database;
pub mod error;
pub mod impersonation;
pub mod recovery;
pub mod sessions;
pub mod totp;
pub mod two_factor;

pub use accounts::AccountService;
pub use audit::AuditService;
pub use authz::{decide, AccessDecision, AccountAction, DenyReason};
pub use database::Database;
pub use error::ServiceError;
pub use impersonation::ImpersonationService;
pub use sessions::{SessionService, SignInOutcome};
pub use two_factor::{EnrollmentStart, TwoFactorService};
