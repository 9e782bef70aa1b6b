//! Deterministic sampling and document comparison.

use crate::Document;

/// Indices of a deterministic, evenly spread sample of `len` items.
///
/// When `len <= sample_size` every index is returned. Otherwise index
/// `floor(i * len / sample_size)` is picked for each `i` in
/// `0..sample_size`, so repeated runs over unchanged input check the
/// same items.
pub fn sample_indices(len: usize, sample_size: usize) -> Vec<usize> {
    if len <= sample_size {
        return (0..len).collect();
    }
    if sample_size == 0 {
        return Vec::new();
    }
    let stride = len as f64 / sample_size as f64;
    (0..sample_size)
        .map(|i| ((i as f64 * stride).floor() as usize).min(len - 1))
        .collect()
}

/// Items at [`sample_indices`].
pub fn pick_sample<T>(items: &[T], sample_size: usize) -> Vec<&T> {
    sample_indices(items.len(), sample_size)
        .into_iter()
        .map(|i| &items[i])
        .collect()
}

/// True when every field of `source` is present in `target` with an equal
/// value. Extra fields on `target` are ignored.
pub fn source_subset_matches_target(source: &Document, target: &Document) -> bool {
    source
        .iter()
        .all(|(key, value)| target.get(key).is_some_and(|other| other == value))
}

/// Compare only the allow-listed fields. A field absent on one side and
/// `null` on the other counts as a difference.
pub fn stable_fields_match<S: AsRef<str>>(left: &Document, right: &Document, fields: &[S]) -> bool {
    fields
        .iter()
        .all(|field| left.get(field.as_ref()) == right.get(field.as_ref()))
}
