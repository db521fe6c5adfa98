//! Conditional grouping of chain links
//!
//! An `if … else … end` sequence is written as flat chain links, each link
//! carrying its `if` marker. When an `end` closes the sequence, the opening
//! condition and any `else` links are split so the marker becomes a link of
//! its own, ahead of the link's remaining parameters.

/// For each link, whether its `if` marker must be split off.
///
/// `conditions[i]` is the processed `if` value of link `i`, if any. An `end`
/// resolves the most recent open markers back to and including the nearest
/// non-`else` one. Markers left open when an `end` is reached stay in place.
pub fn split_points(conditions: &[Option<String>]) -> Vec<bool> {
    let mut splits = vec![false; conditions.len()];
    let mut open: Vec<usize> = Vec::new();

    for (i, condition) in conditions.iter().enumerate() {
        match condition.as_deref() {
            None => {}
            Some("end") => {
                while let Some(j) = open.pop() {
                    splits[j] = true;
                    if conditions[j].as_deref() != Some("else") {
                        break;
                    }
                }
                open.clear();
            }
            Some(_) => open.push(i),
        }
    }

    splits
}
