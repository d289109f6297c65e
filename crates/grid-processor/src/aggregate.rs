//! NaN-aware temporal averaging of grid stacks.
//!
//! A single satellite pass is often cloud-obscured. Averaging nearby passes
//! fills those gaps from what was observed elsewhere in the stack; a cell
//! never observed in any member stays masked.

use tracing::debug;

use crate::error::Result;
use crate::types::{GridStack, NormalizedGrid};

/// Per-cell mean over the valid samples of every stack member.
pub fn aggregate(stack: &GridStack) -> NormalizedGrid {
    let template = stack.template();
    let cells = template.values().len();

    let mut sums = vec![0.0f64; cells];
    let mut counts = vec![0u32; cells];

    for grid in stack.grids() {
        for (idx, (value, valid)) in grid.values().iter().zip(grid.mask()).enumerate() {
            if *valid {
                sums[idx] += value;
                counts[idx] += 1;
            }
        }
    }

    let values: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, &n)| if n > 0 { sum / n as f64 } else { f64::NAN })
        .collect();
    let mask: Vec<bool> = counts.iter().map(|&n| n > 0).collect();

    debug!(
        members = stack.len(),
        filled = mask.iter().filter(|v| **v).count(),
        cells,
        "Aggregated grid stack"
    );

    // Geometry comes from a validated member and every mean of finite
    // samples is finite, so the invariants already hold.
    NormalizedGrid::from_parts(template.lat().to_vec(), template.lon().to_vec(), values, mask)
        .unwrap_or_else(|_| template.clone())
}

/// Build a stack from `grids` and aggregate it.
pub fn aggregate_grids(grids: Vec<NormalizedGrid>) -> Result<NormalizedGrid> {
    let stack = GridStack::new(grids)?;
    Ok(aggregate(&stack))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GridProcessorError;
    use sst_common::TemperatureBand;

    fn grid(values: Vec<f64>) -> NormalizedGrid {
        NormalizedGrid::from_fahrenheit(
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            values,
            &TemperatureBand::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_single_observation_survives() {
        let nan = f64::NAN;
        let stack = GridStack::new(vec![
            grid(vec![nan, 70.0, nan, nan]),
            grid(vec![nan, 72.0, 65.5, nan]),
            grid(vec![nan, nan, nan, nan]),
        ])
        .unwrap();

        let out = aggregate(&stack);
        assert_eq!(out.get(1, 0), Some(65.5));
        assert_eq!(out.get(0, 1), Some(71.0));
        assert_eq!(out.get(0, 0), None);
        assert_eq!(out.get(1, 1), None);
        assert_eq!(out.valid_count(), 2);
    }

    #[test]
    fn test_out_of_band_samples_ignored() {
        let out = aggregate_grids(vec![grid(vec![70.0, 200.0, 80.0, 80.0]), grid(vec![72.0, 75.0, 80.0, 80.0])])
            .unwrap();
        assert_eq!(out.get(0, 0), Some(71.0));
        assert_eq!(out.get(0, 1), Some(75.0));
    }

    #[test]
    fn test_empty_input_is_error() {
        assert_eq!(aggregate_grids(vec![]), Err(GridProcessorError::EmptyStack));
    }
}
