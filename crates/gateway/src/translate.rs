//! Dialect translation between the source Messages shape and the target
//! families.
//!
//! [`chat`] covers the common chat-completions family; [`responses`] covers
//! the dual-envelope "responses" surface. Both directions are pure functions
//! over the wire types: request translation borrows the source request and
//! produces an owned target body, response translation consumes the target
//! body and produces a source response.

pub mod chat;
pub mod responses;

use std::collections::HashMap;

use uuid::Uuid;

/// Generate a fresh source-dialect message id.
pub(crate) fn new_message_id() -> String {
    format!("msg_{}", Uuid::new_v4().simple())
}

/// Generate a tool-call id for targets that omit one.
pub(crate) fn new_call_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("call_{}", &id[..8])
}

/// Bijective map between source tool-call ids and the `fc_` namespace of
/// the responses envelope.
///
/// Scoped to a single request/response pair: request translation allocates
/// target ids for every source id it encounters, and response translation
/// reverses them. Ids the upstream invents mid-response have no reverse
/// entry and pass through unchanged; the next request maps them freshly,
/// so round-tripping holds without cross-request state.
#[derive(Debug, Default)]
pub struct CallIdBridge {
    to_target: HashMap<String, String>,
    to_source: HashMap<String, String>,
    next: u32,
}

impl CallIdBridge {
    /// Translate a source id into the target namespace, allocating on first
    /// sight.
    pub fn target_id(&mut self, source_id: &str) -> String {
        if let Some(existing) = self.to_target.get(source_id) {
            return existing.clone();
        }

        self.next += 1;
        let target = format!("fc_{:04}", self.next);

        self.to_target.insert(source_id.to_string(), target.clone());
        self.to_source.insert(target.clone(), source_id.to_string());

        target
    }

    /// Translate a target id back into the source namespace. Unknown ids
    /// pass through.
    pub fn source_id(&self, target_id: &str) -> String {
        self.to_source
            .get(target_id)
            .cloned()
            .unwrap_or_else(|| target_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_is_bijective_within_a_request() {
        let mut bridge = CallIdBridge::default();

        let a = bridge.target_id("toolu_abc");
        let b = bridge.target_id("toolu_def");
        let a_again = bridge.target_id("toolu_abc");

        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(bridge.source_id(&a), "toolu_abc");
        assert_eq!(bridge.source_id(&b), "toolu_def");
    }

    #[test]
    fn unknown_target_ids_pass_through() {
        let bridge = CallIdBridge::default();
        assert_eq!(bridge.source_id("fc_9999"), "fc_9999");
    }

    #[test]
    fn generated_ids_carry_their_namespace_prefix() {
        assert!(new_message_id().starts_with("msg_"));
        assert!(new_call_id().starts_with("call_"));
    }
}
