//! Declarative plot descriptors.
//!
//! A descriptor says what to draw, not how: which rows of the trajectory to
//! extract, how to interpolate them, and presentation hints. Rendering is
//! left to the caller.

use std::ops::Range;

use nalgebra::{DMatrix, DVector};
use optim_symbolic::Function;
use optim_types::{Bounds, IndexMapping};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{OcpError, Result};

/// How a series is drawn between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PlotType {
    /// Straight lines between nodes.
    #[default]
    Plot,
    /// Integrated between nodes (states).
    Integrated,
    /// Piecewise constant (controls).
    Step,
}

/// What a plot extracts from a trajectory.
#[derive(Debug, Clone)]
pub enum PlotExtractor {
    /// Rows of the state matrix.
    States(Range<usize>),
    /// Rows of the control matrix.
    Controls(Range<usize>),
    /// A compiled `(x, u, p)` function, evaluated at each node.
    Function(Function),
}

impl PlotExtractor {
    /// Evaluate over a trajectory.
    ///
    /// `states` is `nx x n_nodes`, `controls` is `nu x n_nodes` (or fewer
    /// columns; missing columns repeat the last one), `parameters` is `np`.
    /// Returns one row per plotted series and one column per node.
    pub fn evaluate(
        &self,
        states: &DMatrix<f64>,
        controls: &DMatrix<f64>,
        parameters: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        match self {
            Self::States(range) => rows(states, range),
            Self::Controls(range) => rows(controls, range),
            Self::Function(f) => {
                let n_nodes = states.ncols();
                let n_rows = f.size_out(0);
                let mut out = DMatrix::zeros(n_rows, n_nodes);
                for node in 0..n_nodes {
                    let x = states.column(node).into_owned();
                    let u = match controls.ncols() {
                        0 => DVector::zeros(controls.nrows()),
                        n => controls.column(node.min(n - 1)).into_owned(),
                    };
                    let values = f.eval(&[x, u, parameters.clone()])?;
                    if let Some(v) = values.first() {
                        out.set_column(node, v);
                    }
                }
                Ok(out)
            }
        }
    }
}

fn rows(matrix: &DMatrix<f64>, range: &Range<usize>) -> Result<DMatrix<f64>> {
    if range.end > matrix.nrows() || range.start > range.end {
        return Err(OcpError::ShapeMismatch {
            function: "plot extractor".into(),
            expected: range.end,
            actual: matrix.nrows(),
        });
    }
    Ok(matrix.rows(range.start, range.len()).into_owned())
}

/// A plot series attached to a phase.
#[derive(Debug, Clone)]
pub struct CustomPlot {
    /// Data source.
    pub extractor: PlotExtractor,
    /// Interpolation style.
    pub plot_type: PlotType,
    /// One label per series.
    pub legend: Vec<String>,
    /// Fixed y-axis limits.
    pub ylim: Option<(f64, f64)>,
    /// Bounds drawn alongside the series.
    pub bounds: Option<Bounds>,
    /// Key of another plot to draw this one on.
    pub combine_to: Option<String>,
    /// Which subplot each series goes to.
    pub axes_idx: Option<IndexMapping>,
}

impl CustomPlot {
    /// A plot with default presentation.
    #[must_use]
    pub fn new(extractor: PlotExtractor, plot_type: PlotType) -> Self {
        Self {
            extractor,
            plot_type,
            legend: Vec::new(),
            ylim: None,
            bounds: None,
            combine_to: None,
            axes_idx: None,
        }
    }

    /// Set the legend.
    #[must_use]
    pub fn with_legend(mut self, legend: Vec<String>) -> Self {
        self.legend = legend;
        self
    }

    /// Set the y-axis limits.
    #[must_use]
    pub fn with_ylim(mut self, min: f64, max: f64) -> Self {
        self.ylim = Some((min, max));
        self
    }

    /// Set the bounds.
    #[must_use]
    pub fn with_bounds(mut self, bounds: Option<Bounds>) -> Self {
        self.bounds = bounds;
        self
    }

    /// Draw on top of another plot.
    #[must_use]
    pub fn with_combine_to(mut self, key: impl Into<String>) -> Self {
        self.combine_to = Some(key.into());
        self
    }

    /// Route series to subplots.
    #[must_use]
    pub fn with_axes_idx(mut self, axes_idx: IndexMapping) -> Self {
        self.axes_idx = Some(axes_idx);
        self
    }

    /// Evaluate the series over a trajectory.
    pub fn evaluate(
        &self,
        states: &DMatrix<f64>,
        controls: &DMatrix<f64>,
        parameters: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        self.extractor.evaluate(states, controls, parameters)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use optim_symbolic::SymVector;

    #[test]
    fn test_state_rows() {
        let states = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let controls = DMatrix::zeros(1, 2);
        let plot = CustomPlot::new(PlotExtractor::States(1..3), PlotType::Integrated)
            .with_legend(vec!["a".into(), "b".into()]);

        let out = plot.evaluate(&states, &controls, &DVector::zeros(0)).unwrap();
        assert_eq!(out.shape(), (2, 2));
        assert_relative_eq!(out[(0, 1)], 4.0);
        assert_relative_eq!(out[(1, 0)], 5.0);

        let bad = CustomPlot::new(PlotExtractor::States(2..5), PlotType::Plot);
        assert!(bad.evaluate(&states, &controls, &DVector::zeros(0)).is_err());
    }

    #[test]
    fn test_function_extractor() {
        let x = SymVector::sym("x", 2);
        let u = SymVector::sym("u", 1);
        let p = SymVector::new();
        let y = SymVector::from_exprs(vec![&x[0] + &u[0]]);
        let f = Function::new("sum", [("x", x), ("u", u), ("p", p)], [("y", y)]).unwrap();

        let states = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 0.0, 0.0, 0.0]);
        // One control column fewer than states: the last node reuses it.
        let controls = DMatrix::from_row_slice(1, 2, &[10.0, 20.0]);
        let out = PlotExtractor::Function(f)
            .evaluate(&states, &controls, &DVector::zeros(0))
            .unwrap();

        assert_relative_eq!(out[(0, 0)], 11.0);
        assert_relative_eq!(out[(0, 1)], 22.0);
        assert_relative_eq!(out[(0, 2)], 23.0);
    }
}
