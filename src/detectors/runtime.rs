//! Execution-based detectors, one per fault kind
//!
//! Each detector asks the snippet for an execution outcome and matches only
//! when the snippet raised its own fault kind. Other faults, normal
//! completion, suppressed exits, timeouts and sandbox failures all count as
//! no match.

use super::{CheckFn, Detector, DetectorKind, DetectorRegistry, Snippet};
use crate::sandbox::FaultKind;

const RUNTIME_DETECTORS: [(&str, &str, CheckFn); 6] = [
    (
        "check_name_error",
        "Running the code raises NameError",
        raises_name_fault,
    ),
    (
        "check_type_error",
        "Running the code raises TypeError",
        raises_type_fault,
    ),
    (
        "check_index_error",
        "Running the code raises IndexError",
        raises_index_fault,
    ),
    (
        "check_key_error",
        "Running the code raises KeyError",
        raises_key_fault,
    ),
    (
        "check_attribute_error",
        "Running the code raises AttributeError",
        raises_attribute_fault,
    ),
    (
        "check_zero_division",
        "Running the code raises ZeroDivisionError",
        raises_division_by_zero,
    ),
];

pub fn register(registry: &mut DetectorRegistry) {
    for (name, description, check) in RUNTIME_DETECTORS {
        registry.register(Detector::new(
            name,
            DetectorKind::Dynamic,
            description,
            check,
        ));
    }
}

fn raises(snippet: &Snippet<'_>, kind: FaultKind) -> bool {
    snippet
        .execution()
        .is_some_and(|outcome| outcome.raised(kind))
}

pub fn raises_name_fault(snippet: &Snippet<'_>) -> bool {
    raises(snippet, FaultKind::Name)
}

pub fn raises_type_fault(snippet: &Snippet<'_>) -> bool {
    raises(snippet, FaultKind::Type)
}

pub fn raises_index_fault(snippet: &Snippet<'_>) -> bool {
    raises(snippet, FaultKind::Index)
}

pub fn raises_key_fault(snippet: &Snippet<'_>) -> bool {
    raises(snippet, FaultKind::Key)
}

pub fn raises_attribute_fault(snippet: &Snippet<'_>) -> bool {
    raises(snippet, FaultKind::Attribute)
}

pub fn raises_division_by_zero(snippet: &Snippet<'_>) -> bool {
    raises(snippet, FaultKind::DivisionByZero)
}
