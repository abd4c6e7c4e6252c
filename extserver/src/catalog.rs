//! Listings of the external server kinds and their attributes.

use std::fmt::Write as _;

use anyhow::Result;
use extserver_core::Variant;
use extserver_resource::{
    attributes::AttributeSpec,
    gate::{self, OLDEST_SUPPORTED},
    registry,
};

fn variants_text() -> String {
    let mut out = String::new();
    for v in Variant::ALL {
        let since = gate::variant_min_version(v).unwrap_or(OLDEST_SUPPORTED);
        let required = registry::required_attributes(v);
        let _ = writeln!(out, "{:<30} since {:<10} requires {}", v, since.to_string(), required.join(", "));
    }
    out
}

fn flags(spec: &AttributeSpec, v: Variant) -> Vec<String> {
    let mut flags = Vec::new();
    if spec.is_required_for(v) {
        flags.push("required".to_string());
    }
    if spec.sensitive {
        flags.push("sensitive".to_string());
    }
    if spec.computed {
        flags.push("computed".to_string());
    }
    if let Some(since) = spec.since {
        flags.push(format!("since {}", since));
    }
    flags
}

fn attributes_text(v: Variant) -> String {
    let mut out = String::new();
    for spec in registry::applicable_specs(v) {
        let mut line = format!("{:<40} {}", spec.name, spec.kind.name());
        if let Some(allowed) = spec.kind.allowed_values() {
            let _ = write!(line, " ({})", allowed.join("|"));
        }
        let flags = flags(spec, v);
        if !flags.is_empty() {
            let _ = write!(line, " [{}]", flags.join(", "));
        }
        let _ = writeln!(out, "{}", line.trim_end());
    }
    out
}

/// Run the `variants` command.
pub(crate) fn variants() -> Result<()> {
    print!("{}", variants_text());
    Ok(())
}

/// Run the `attributes` command.
pub(crate) fn attributes(variant: &str) -> Result<()> {
    let v = registry::classify(variant)?;
    print!("{}", attributes_text(v));
    Ok(())
}
