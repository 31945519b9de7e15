use std::sync::Arc;

use serde_json::Value;

use crate::domain::chain::{PriorityChain, Ranked};

/// Knows one response envelope: how to recognize it, take the payload out of
/// it, and put a payload into it.
pub trait ResponseWrapper: Ranked {
    /// Whether `value` is this wrapper's envelope.
    fn supports(&self, value: &Value) -> bool;

    /// Extract the payload from the envelope.
    fn unwrap_data(&self, value: Value) -> Value;

    /// Put a payload into the envelope.
    fn wrap_data(&self, value: Value) -> Value;
}

/// Terminal member of every wrapper chain; leaves values untouched.
///
/// It owns priority `i32::MAX`. Registered wrappers asking for that priority
/// are placed just ahead of it.
pub struct PassthroughWrapper;

impl Ranked for PassthroughWrapper {
    fn id(&self) -> &str {
        "passthrough"
    }

    fn priority(&self) -> i32 {
        i32::MAX
    }
}

impl ResponseWrapper for PassthroughWrapper {
    fn supports(&self, _value: &Value) -> bool {
        true
    }

    fn unwrap_data(&self, value: Value) -> Value {
        value
    }

    fn wrap_data(&self, value: Value) -> Value {
        value
    }
}

/// First-match chain over the registered wrappers.
pub struct WrapperChain {
    chain: PriorityChain<dyn ResponseWrapper>,
}

impl Default for WrapperChain {
    fn default() -> Self {
        Self::new()
    }
}

impl WrapperChain {
    pub fn new() -> Self {
        Self {
            chain: PriorityChain::new(vec![Arc::new(PassthroughWrapper)]),
        }
    }

    pub fn register(&self, wrapper: Arc<dyn ResponseWrapper>) {
        if wrapper.priority() == i32::MAX {
            tracing::warn!(
                wrapper = wrapper.id(),
                "Priority i32::MAX is reserved for the passthrough wrapper; using i32::MAX - 1"
            );
            self.chain.register(Arc::new(Clamped(wrapper)));
        } else {
            self.chain.register(wrapper);
        }
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Payload of `value` according to the first wrapper that recognizes it.
    pub fn unwrap_result(&self, value: Value) -> Value {
        let snapshot = self.chain.snapshot();
        match snapshot.iter().find(|w| w.supports(&value)) {
            Some(w) => {
                tracing::trace!(wrapper = w.id(), "Unwrapping handler result");
                w.unwrap_data(value)
            }
            None => value,
        }
    }

    /// Envelope for a plain handler result.
    ///
    /// The highest-priority non-terminal wrapper builds the envelope. A value
    /// that some non-terminal wrapper already recognizes is returned as is, so
    /// wrapping is idempotent.
    pub fn wrap_result(&self, value: Value) -> Value {
        let snapshot = self.chain.snapshot();
        let envelopes: Vec<_> = snapshot
            .iter()
            .filter(|w| w.priority() < i32::MAX)
            .collect();
        if envelopes.iter().any(|w| w.supports(&value)) {
            return value;
        }
        match envelopes.first() {
            Some(w) => w.wrap_data(value),
            None => value,
        }
    }
}

/// Registered wrapper moved off the reserved terminal priority.
struct Clamped(Arc<dyn ResponseWrapper>);

impl Ranked for Clamped {
    fn id(&self) -> &str {
        self.0.id()
    }

    fn priority(&self) -> i32 {
        i32::MAX - 1
    }
}

impl ResponseWrapper for Clamped {
    fn supports(&self, value: &Value) -> bool {
        self.0.supports(value)
    }

    fn unwrap_data(&self, value: Value) -> Value {
        self.0.unwrap_data(value)
    }

    fn wrap_data(&self, value: Value) -> Value {
        self.0.wrap_data(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Envelope;

    impl Ranked for Envelope {
        fn id(&self) -> &str {
            "envelope"
        }
        fn priority(&self) -> i32 {
            100
        }
    }

    struct LastResort;

    impl Ranked for LastResort {
        fn id(&self) -> &str {
            "last_resort"
        }
        fn priority(&self) -> i32 {
            i32::MAX
        }
    }

    impl ResponseWrapper for LastResort {
        fn supports(&self, value: &Value) -> bool {
            value.get("payload").is_some()
        }
        fn unwrap_data(&self, mut value: Value) -> Value {
            value["payload"].take()
        }
        fn wrap_data(&self, value: Value) -> Value {
            json!({"payload": value})
        }
    }

    impl ResponseWrapper for Envelope {
        fn supports(&self, value: &Value) -> bool {
            value.get("code").is_some() && value.get("data").is_some()
        }
        fn unwrap_data(&self, mut value: Value) -> Value {
            value["data"].take()
        }
        fn wrap_data(&self, value: Value) -> Value {
            json!({"code": 200, "message": "success", "data": value})
        }
    }

    #[test]
    fn empty_chain_is_transparent_both_ways() {
        let chain = WrapperChain::new();
        assert_eq!(chain.len(), 1);
        let v = json!([1, 2, 3]);
        assert_eq!(chain.unwrap_result(v.clone()), v);
        assert_eq!(chain.wrap_result(v.clone()), v);
    }

    #[test]
    fn envelope_is_unwrapped_and_plain_list_left_alone() {
        let chain = WrapperChain::new();
        chain.register(Arc::new(Envelope));

        let wrapped = json!({"code": 200, "data": [{"id": 1}]});
        assert_eq!(chain.unwrap_result(wrapped), json!([{"id": 1}]));

        let plain = json!([{"id": 1}]);
        assert_eq!(chain.unwrap_result(plain.clone()), plain);
        // already plain: unwrapping twice changes nothing
        let once = chain.unwrap_result(plain.clone());
        assert_eq!(chain.unwrap_result(once), plain);
    }

    #[test]
    fn wrap_uses_first_envelope_and_is_idempotent() {
        let chain = WrapperChain::new();
        chain.register(Arc::new(Envelope));

        let wrapped = chain.wrap_result(json!([1]));
        assert_eq!(wrapped, json!({"code": 200, "message": "success", "data": [1]}));
        assert_eq!(chain.wrap_result(wrapped.clone()), wrapped);
    }

    #[test]
    fn wrapper_at_max_priority_still_runs_before_passthrough() {
        let chain = WrapperChain::new();
        chain.register(Arc::new(LastResort));
        assert_eq!(chain.len(), 2);

        let ids: Vec<_> = chain.chain.snapshot().iter().map(|w| w.id().to_string()).collect();
        assert_eq!(ids, ["last_resort", "passthrough"]);

        assert_eq!(chain.unwrap_result(json!({"payload": [7]})), json!([7]));
        assert_eq!(chain.wrap_result(json!([7])), json!({"payload": [7]}));
    }
}
