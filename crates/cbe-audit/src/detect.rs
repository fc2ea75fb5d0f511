use serde::{Deserialize, Serialize};

use crate::{FieldDescriptor, FieldValue, Snapshot};

/// A tracked field whose canonical value differs between two snapshots.
/// Values are already canonicalized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCandidate {
    pub field_name: String,
    pub label: String,
    pub old_value: FieldValue,
    pub new_value: FieldValue,
}

fn read(snapshot: &Snapshot, field: &FieldDescriptor) -> FieldValue {
    let raw = snapshot.get(field.name).unwrap_or(&FieldValue::Null);
    field.canonicalize(raw)
}

/// One candidate per tracked field that differs, in `fields` order.
/// Fields not listed are never compared.
pub fn detect_changes(
    old: &Snapshot,
    new: &Snapshot,
    fields: &[FieldDescriptor],
) -> Vec<ChangeCandidate> {
    fields
        .iter()
        .filter_map(|field| {
            let old_value = read(old, field);
            let new_value = read(new, field);
            (old_value != new_value).then(|| ChangeCandidate {
                field_name: field.name.to_string(),
                label: field.label.to_string(),
                old_value,
                new_value,
            })
        })
        .collect()
}

/// Overwrite each candidate's field with its new value.
pub fn apply_changes(snapshot: &mut Snapshot, candidates: &[ChangeCandidate]) {
    for c in candidates {
        snapshot.insert(c.field_name.clone(), c.new_value.clone());
    }
}
