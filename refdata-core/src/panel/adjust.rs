//! Adjustment-factor transforms.

use super::dense::DensePanel;
use crate::error::{RefDataError, Result};

/// Period-over-period ratio of an absolute factor panel.
///
/// The first row is 1.0. Any undefined division (either side unfilled,
/// zero denominator, non-finite result) is 1.0: a missing adjustment
/// means no change.
pub fn to_ratio(panel: &DensePanel<f64>) -> DensePanel<f64> {
    let mut out = panel.map(|_| 1.0);
    for col in 0..panel.n_entities() {
        for row in 0..panel.n_dates() {
            let ratio = if row == 0 {
                1.0
            } else {
                match (panel.get_at(row, col), panel.get_at(row - 1, col)) {
                    (Some(cur), Some(prev)) if *prev != 0.0 => {
                        let r = cur / prev;
                        if r.is_finite() {
                            r
                        } else {
                            1.0
                        }
                    }
                    _ => 1.0,
                }
            };
            out.set_at(row, col, Some(ratio));
        }
    }
    out
}

/// Rebuild absolute factors from a ratio panel and the first row's values.
///
/// Row 0 is `base`; each later row is the previous row times the ratio.
/// An entity with no base value stays unfilled.
pub fn cumulate(ratio: &DensePanel<f64>, base: &[Option<f64>]) -> Result<DensePanel<f64>> {
    if base.len() != ratio.n_entities() {
        return Err(RefDataError::InvalidArgument(format!(
            "base row has {} values for {} entities",
            base.len(),
            ratio.n_entities()
        )));
    }
    let mut out = DensePanel::new_unfilled(ratio.dates().to_vec(), ratio.entities().to_vec())?;
    for (col, start) in base.iter().enumerate() {
        let mut level = *start;
        for row in 0..ratio.n_dates() {
            if row > 0 {
                level = level.map(|v| v * ratio.get_at(row, col).copied().unwrap_or(1.0));
            }
            out.set_at(row, col, level);
        }
    }
    Ok(out)
}
