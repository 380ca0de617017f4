//! HCC relevance evaluation.

use std::sync::{Arc, OnceLock};

use super::codes::{CodeSetError, CodeSetSource, ReferenceCodes};
use super::types::Condition;

/// Keep the conditions whose code is in `reference_codes`, in input order.
pub fn evaluate(conditions: &[Condition], reference_codes: &ReferenceCodes) -> Vec<Condition> {
    conditions
        .iter()
        .filter(|c| reference_codes.contains(c.code()))
        .cloned()
        .collect()
}

/// Evaluator with a lazily loaded default code set.
///
/// The default source is read at most once per evaluator, and only when a
/// note arrives without a pre-loaded set.
pub struct HccEvaluator {
    default_source: Box<dyn CodeSetSource>,
    default_codes: OnceLock<Arc<ReferenceCodes>>,
}

impl HccEvaluator {
    pub fn new(default_source: Box<dyn CodeSetSource>) -> Self {
        Self {
            default_source,
            default_codes: OnceLock::new(),
        }
    }

    /// Use `supplied` when present, otherwise the (cached) default set.
    pub fn resolve_codes(
        &self,
        supplied: Option<&Arc<ReferenceCodes>>,
    ) -> Result<Arc<ReferenceCodes>, CodeSetError> {
        if let Some(codes) = supplied {
            return Ok(Arc::clone(codes));
        }
        if let Some(codes) = self.default_codes.get() {
            return Ok(Arc::clone(codes));
        }

        tracing::info!(
            source = %self.default_source.describe(),
            "No reference codes supplied, loading default set"
        );
        let loaded = Arc::new(self.default_source.load()?);
        // A concurrent first load may win the race; either copy is identical.
        Ok(Arc::clone(self.default_codes.get_or_init(|| loaded)))
    }

    /// Filter `conditions` against the supplied or default code set.
    pub fn evaluate(
        &self,
        conditions: &[Condition],
        supplied: Option<&Arc<ReferenceCodes>>,
    ) -> Result<Vec<Condition>, CodeSetError> {
        let codes = self.resolve_codes(supplied)?;
        let relevant = evaluate(conditions, &codes);
        tracing::info!(
            relevant = relevant.len(),
            total = conditions.len(),
            "Evaluated HCC-relevant conditions"
        );
        Ok(relevant)
    }
}
