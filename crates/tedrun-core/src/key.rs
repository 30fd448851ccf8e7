//! Run-key derivation from BIDS filename components.

/// Entity prefixes that participate in the run key, in join order.
const KEY_PREFIXES: [&str; 4] = ["sub-", "ses-", "task-", "run-"];

/// Derive the grouping key for a BIDS-named file.
///
/// The filename is split on `_` and the first component matching each
/// of `sub-`, `ses-`, `task-` and `run-` is kept; absent entities are
/// simply omitted from the key. Two echo files of the same run always
/// yield the same key under the fMRIPrep naming convention.
pub fn run_key_for(filename: &str) -> String {
    let components: Vec<&str> = filename.split('_').collect();

    let mut parts: Vec<&str> = Vec::new();
    for prefix in KEY_PREFIXES {
        if let Some(component) = components.iter().find(|c| c.starts_with(prefix)) {
            parts.push(component);
        }
    }
    parts.join("_")
}
