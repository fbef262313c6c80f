//! Role declaration and agent authentication
//!
//! Connection state machine: `Unauthenticated -> {Controller | Agent} -> Closed`.
//! Controllers need no credential. Agents must present the shared secret;
//! a wrong secret is terminal for the connection, while traffic before any
//! `hello` is only answered with an error.

use da_core::secret::validate_token;
use da_protocol::{Envelope, Role};

/// Reply to an agent whose token does not match
pub const INVALID_TOKEN: &str = "invalid token";

/// Reply to a `hello` whose role is missing or unknown
pub const UNKNOWN_ROLE: &str = "unknown role";

/// Reply to any non-`hello` message before the handshake
pub const HANDSHAKE_REQUIRED: &str = "handshake not completed";

/// Reply to a `hello` on a connection that already has a role
pub const ROLE_ALREADY_ASSIGNED: &str = "role already assigned";

/// Decision for a single `hello`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Assign this role and join its group
    Accepted(Role),
    /// Reply with an error; close the connection if `terminal`
    Rejected {
        reason: &'static str,
        terminal: bool,
    },
}

/// Evaluate a `hello` from a connection that has no role yet
pub fn evaluate_hello(hello: &Envelope, shared_secret: &str) -> HandshakeOutcome {
    match hello.role() {
        Some(Role::Controller) => HandshakeOutcome::Accepted(Role::Controller),
        Some(Role::Agent) => {
            let token = hello.token().unwrap_or_default();
            if validate_token(token, shared_secret) {
                HandshakeOutcome::Accepted(Role::Agent)
            } else {
                HandshakeOutcome::Rejected {
                    reason: INVALID_TOKEN,
                    terminal: true,
                }
            }
        }
        None => HandshakeOutcome::Rejected {
            reason: UNKNOWN_ROLE,
            terminal: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "s3cret";

    fn hello(text: &str) -> Envelope {
        Envelope::parse(text).unwrap()
    }

    #[test]
    fn test_controller_needs_no_token() {
        assert_eq!(
            evaluate_hello(&hello(r#"{"type":"hello","role":"controller"}"#), SECRET),
            HandshakeOutcome::Accepted(Role::Controller)
        );
        assert_eq!(
            evaluate_hello(&hello(r#"{"type":"hello","role":"app"}"#), SECRET),
            HandshakeOutcome::Accepted(Role::Controller)
        );
    }

    #[test]
    fn test_agent_with_valid_token() {
        assert_eq!(
            evaluate_hello(
                &hello(r#"{"type":"hello","role":"agent","token":"s3cret"}"#),
                SECRET
            ),
            HandshakeOutcome::Accepted(Role::Agent)
        );
    }

    #[test]
    fn test_agent_with_bad_or_missing_token_is_terminal() {
        let rejected = HandshakeOutcome::Rejected {
            reason: INVALID_TOKEN,
            terminal: true,
        };
        assert_eq!(
            evaluate_hello(
                &hello(r#"{"type":"hello","role":"agent","token":"guess"}"#),
                SECRET
            ),
            rejected
        );
        assert_eq!(
            evaluate_hello(&hello(r#"{"type":"hello","role":"agent"}"#), SECRET),
            rejected
        );
        assert_eq!(
            evaluate_hello(
                &hello(r#"{"type":"hello","role":"agent","token":42}"#),
                SECRET
            ),
            rejected
        );
    }

    #[test]
    fn test_agent_rejected_when_relay_has_no_secret() {
        assert_eq!(
            evaluate_hello(&hello(r#"{"type":"hello","role":"agent","token":""}"#), ""),
            HandshakeOutcome::Rejected {
                reason: INVALID_TOKEN,
                terminal: true
            }
        );
    }

    #[test]
    fn test_unknown_role_is_not_terminal() {
        assert_eq!(
            evaluate_hello(&hello(r#"{"type":"hello","role":"root"}"#), SECRET),
            HandshakeOutcome::Rejected {
                reason: UNKNOWN_ROLE,
                terminal: false
            }
        );
    }
}
