//! Construction of typed operations from untyped opspecs.
//!
//! Envelopes arrive carrying raw JSON. The factory is the single place
//! that turns them into [`Operation`] values; everything past it works
//! with typed data only.

use serde_json::Value;
use tracing::warn;

use crate::error::OtError;
use crate::ops::Operation;

/// Builds typed operations from JSON opspecs.
#[derive(Clone, Copy, Debug, Default)]
pub struct OperationFactory;

impl OperationFactory {
    pub fn new() -> Self {
        Self
    }

    /// Parse an opspec, or explain why it cannot be parsed.
    pub fn try_create(&self, spec: &Value) -> Result<Operation, OtError> {
        serde_json::from_value(spec.clone()).map_err(|e| {
            let optype = spec
                .get("optype")
                .and_then(Value::as_str)
                .unwrap_or("<missing>");
            OtError::InvalidSpec(format!("{optype}: {e}"))
        })
    }

    /// Parse an opspec, logging and swallowing failures.
    ///
    /// Inbound streams use this form: a malformed op from a peer is warned
    /// about and dropped rather than taking the session down.
    pub fn create(&self, spec: &Value) -> Option<Operation> {
        match self.try_create(spec) {
            Ok(op) => Some(op),
            Err(e) => {
                warn!(error = %e, "dropping unparseable opspec");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::OpKind;
    use serde_json::json;

    #[test]
    fn test_create_known_opspec() {
        let factory = OperationFactory::new();
        let op = factory
            .create(&json!({
                "optype": "SplitParagraph",
                "memberid": "alice_1",
                "timestamp": 5,
                "position": 2,
            }))
            .unwrap();
        assert_eq!(
            op.kind,
            OpKind::SplitParagraph {
                position: 2,
                style_name: None,
                move_cursor: false,
            }
        );
        assert_eq!(op.optype(), "SplitParagraph");
    }

    #[test]
    fn test_unknown_optype_names_the_culprit() {
        let factory = OperationFactory::new();
        let err = factory
            .try_create(&json!({"optype": "Teleport", "memberid": "a_1"}))
            .unwrap_err();
        assert!(err.to_string().contains("Teleport"));
        assert!(factory.create(&json!({"optype": "Teleport", "memberid": "a_1"})).is_none());
    }

    #[test]
    fn test_missing_memberid_is_invalid() {
        let factory = OperationFactory::new();
        assert!(factory
            .try_create(&json!({"optype": "AddCursor"}))
            .is_err());
    }
}
