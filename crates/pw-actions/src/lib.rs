//! # pw-actions
//!
//! Effector implementations for Path Warden.
//!
//! This crate provides the action handler registry that implements the
//! core [`Effector`](pw_core::Effector) contract, one handler per
//! containment action kind, and the in-memory mock cloud backend the
//! handlers mutate.

pub mod detach_policy;
pub mod disable_login_profile;
pub mod mock;
pub mod notify_operator;
pub mod quarantine_role;
pub mod registry;
pub mod revert_policy_version;
pub mod revoke_access_key;

pub use detach_policy::{DetachRolePolicyHandler, DetachUserPolicyHandler};
pub use disable_login_profile::DisableLoginProfileHandler;
pub use mock::MockCloud;
pub use notify_operator::NotifyOperatorHandler;
pub use quarantine_role::QuarantineRoleHandler;
pub use registry::{ActionHandler, EffectorRegistry};
pub use revert_policy_version::RevertPolicyVersionHandler;
pub use revoke_access_key::RevokeAccessKeyHandler;
