//! Attribute-level diff between a plan and the last known state.

use extserver_core::{AttributeOperation, AttributeValue, ConnectorRecord};

use crate::{codec, error::EngineError, registry};

/// The operations that turn `state` into `plan`, in attribute table order.
///
/// Both records must be of the same variant; a type change is a replacement,
/// not a diff. Every applicable attribute is compared. Scalars become a
/// single `Replace`. Sets become `AddElements` (plan minus state) followed by
/// `RemoveElements` (state minus plan), so a required multi-valued attribute
/// is never empty in between.
///
/// A computed attribute the plan leaves unset keeps whatever the remote
/// store assigned to it; only a declared value is converged.
///
/// Sensitive attributes need no special case: the remote store never reports
/// them, so `state` carries the value this engine last sent, and a secret is
/// sent again whenever the plan differs from that (including when nothing is
/// known to have been sent).
pub fn plan(plan: &ConnectorRecord, state: &ConnectorRecord) -> Result<Vec<AttributeOperation>, EngineError> {
    if plan.variant != state.variant {
        return Err(EngineError::VariantChanged {
            identifier: state.identifier.clone(),
            from: state.variant,
            to: plan.variant,
        });
    }
    let mut operations = Vec::new();
    for spec in registry::applicable_specs(plan.variant) {
        let wanted = codec::normalize(spec, plan.get(spec.name))?;
        let current = codec::canonical(spec, state.get(spec.name));
        if wanted.is_absent() && (current.is_absent() || spec.computed) {
            continue;
        }
        if codec::equal(spec, &wanted, &current) {
            continue;
        }
        match (&wanted, &current) {
            (AttributeValue::StringSet(w), AttributeValue::StringSet(c)) => {
                let added: Vec<&String> = w.difference(c).collect();
                let removed: Vec<&String> = c.difference(w).collect();
                if !added.is_empty() {
                    operations.push(AttributeOperation::add_elements(
                        spec.name,
                        AttributeValue::set(added.into_iter().cloned()),
                    ));
                }
                if !removed.is_empty() {
                    operations.push(AttributeOperation::remove_elements(
                        spec.name,
                        AttributeValue::set(removed.into_iter().cloned()),
                    ));
                }
            }
            (AttributeValue::StringSet(_), AttributeValue::Absent) => {
                operations.push(AttributeOperation::add_elements(spec.name, wanted.clone()));
            }
            (AttributeValue::Absent, AttributeValue::StringSet(_)) => {
                operations.push(AttributeOperation::remove_elements(spec.name, current.clone()));
            }
            _ => operations.push(AttributeOperation::replace(spec.name, wanted.clone())),
        }
    }
    for op in operations.iter() {
        tracing::debug!(
            attribute = op.path.as_str(),
            kind = ?op.kind,
            value = %op.value,
            "planned operation"
        );
    }
    Ok(operations)
}
