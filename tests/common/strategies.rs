use proptest::prelude::*;
use sprout_core::state_machine::Stage;

/// Any catalog stage
pub fn stage_strategy() -> impl Strategy<Value = Stage> {
    prop::sample::select(Stage::ALL.to_vec())
}

/// Valid tray labels
pub fn tray_label_strategy() -> impl Strategy<Value = String> {
    "[A-Z0-9]{1,10}"
}

/// Strings that are never well-formed batch codes
pub fn malformed_code_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("0".to_string()),
        Just("000".to_string()),
        "[A-Z][A-Z0-9-]{0,8}",
        "-[1-9][0-9]{0,5}",
        "[1-9][0-9]{0,3}\\.[0-9]{1,2}",
        " [1-9][0-9]{0,3}",
        "[1-9][0-9]{18,22}",
    ]
}
