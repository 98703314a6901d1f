//! SIMD batch evaluation.
//!
//! Evaluates a program at many points using `wide::f64x4`, four points per
//! pass, with a scalar tail for the remaining one to three points.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     evaluate_batch                      │
//! ├─────────────────────────────────────────────────────────┤
//! │  Data:   [p0, p1, p2, p3, p4, p5, p6, p7, p8, p9]       │
//! │                │                   │           │        │
//! │          ┌─────┴─────┐       ┌─────┴─────┐   ┌─┴─┐      │
//! │          │ SIMD Chunk│       │ SIMD Chunk│   │Rem│      │
//! │          │ [p0-p3]   │       │ [p4-p7]   │   │p8-│      │
//! │          │  f64x4    │       │  f64x4    │   │p9 │      │
//! │          └───────────┘       └───────────┘   └───┘      │
//! │                                               │         │
//! │                                          Scalar path    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Only correctly rounded operations use the vector instructions from
//! `wide`: the four arithmetic operators, `neg`, `abs` and `sqrt`. Every other
//! operator runs lane by lane through the scalar semantics of [`Op`], so a
//! batch produces bit-for-bit the values of [`Evaluator::evaluate`],
//! including infinities and NaN.

use wide::f64x4;

use super::instruction::Instruction;
use super::{Evaluator, Program};
use crate::{DiffError, Op};

const LANES: usize = 4;

impl<I: ?Sized, O> Evaluator<I, O> {
    /// Evaluate at many points in columnar layout.
    ///
    /// `columns[j][p]` is input `j` at point `p`; `outputs[k][p]` receives
    /// output entry `k` (row-major for matrix outputs) at point `p`. Output
    /// columns may be longer than the number of points; the excess is left
    /// untouched.
    ///
    /// # Errors
    /// `DimensionMismatch` if the number of input or output columns is wrong,
    /// the input columns differ in length, or an output column is too short.
    ///
    /// # Example
    /// ```
    /// use symb_graph::{CompileOptions, Context, compile};
    ///
    /// let mut ctx = Context::new();
    /// let x = ctx.make_variable("x");
    /// let f = ctx.square(x).unwrap();
    /// let eval = compile::<[f64], Vec<f64>>(&ctx, &[f], &[x], &CompileOptions::new()).unwrap();
    ///
    /// let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
    /// let mut squares = vec![0.0; 5];
    /// eval.evaluate_batch(&[&xs[..]], &mut [&mut squares[..]]).unwrap();
    /// assert_eq!(squares, vec![1.0, 4.0, 9.0, 16.0, 25.0]);
    /// ```
    pub fn evaluate_batch(
        &self,
        columns: &[&[f64]],
        outputs: &mut [&mut [f64]],
    ) -> Result<(), DiffError> {
        self.program.run_batch(columns, outputs)
    }
}

impl Program {
    /// Validate a columnar batch and return its number of points.
    pub(crate) fn check_batch(
        &self,
        columns: &[&[f64]],
        outputs: &[&mut [f64]],
    ) -> Result<usize, DiffError> {
        if columns.len() != self.input_count {
            return Err(DiffError::DimensionMismatch {
                expected: self.input_count,
                got: columns.len(),
            });
        }
        if outputs.len() != self.outputs.len() {
            return Err(DiffError::DimensionMismatch {
                expected: self.outputs.len(),
                got: outputs.len(),
            });
        }
        // without inputs the output columns set the point count
        let points = match columns.first() {
            Some(first) => first.len(),
            None => outputs.iter().map(|o| o.len()).min().unwrap_or(0),
        };
        if let Some(bad) = columns.iter().find(|c| c.len() != points) {
            return Err(DiffError::DimensionMismatch {
                expected: points,
                got: bad.len(),
            });
        }
        if let Some(short) = outputs.iter().find(|o| o.len() < points) {
            return Err(DiffError::DimensionMismatch {
                expected: points,
                got: short.len(),
            });
        }
        Ok(points)
    }

    pub(crate) fn run_batch(
        &self,
        columns: &[&[f64]],
        outputs: &mut [&mut [f64]],
    ) -> Result<(), DiffError> {
        let points = self.check_batch(columns, outputs)?;
        let full = points - points % LANES;

        let mut slots = vec![f64x4::splat(0.0); self.slot_count];
        let mut lanes_in = Vec::with_capacity(columns.len());
        for base in (0..full).step_by(LANES) {
            lanes_in.clear();
            lanes_in.extend(columns.iter().map(|c| {
                f64x4::new([c[base], c[base + 1], c[base + 2], c[base + 3]])
            }));
            self.run_lanes(&lanes_in, &mut slots);
            for (out, &slot) in outputs.iter_mut().zip(self.outputs.iter()) {
                out[base..base + LANES].copy_from_slice(&slots[slot as usize].to_array());
            }
        }

        if full < points {
            let mut point = vec![0.0; columns.len()];
            let mut result = vec![0.0; self.outputs.len()];
            for p in full..points {
                for (v, c) in point.iter_mut().zip(columns) {
                    *v = c[p];
                }
                self.run(&point, &mut result);
                for (out, r) in outputs.iter_mut().zip(&result) {
                    out[p] = *r;
                }
            }
        }
        Ok(())
    }

    fn run_lanes(&self, inputs: &[f64x4], slots: &mut [f64x4]) {
        for instruction in &self.instructions {
            match *instruction {
                Instruction::Input { dst, index } => {
                    slots[dst as usize] = inputs[index as usize];
                }
                Instruction::Const { dst, value } => {
                    slots[dst as usize] = f64x4::splat(value);
                }
                Instruction::Unary { op, dst, a } => {
                    slots[dst as usize] = unary_lanes(op, slots[a as usize]);
                }
                Instruction::Binary { op, dst, a, b } => {
                    slots[dst as usize] = binary_lanes(op, slots[a as usize], slots[b as usize]);
                }
                Instruction::Select {
                    dst,
                    cond,
                    then,
                    otherwise,
                } => {
                    let c = slots[cond as usize].to_array();
                    let t = slots[then as usize].to_array();
                    let o = slots[otherwise as usize].to_array();
                    slots[dst as usize] =
                        f64x4::new(std::array::from_fn(|i| if c[i] == 0.0 { o[i] } else { t[i] }));
                }
            }
        }
    }
}

#[inline]
fn unary_lanes(op: Op, a: f64x4) -> f64x4 {
    match op {
        Op::Neg => -a,
        Op::Abs => a.abs(),
        Op::Sqrt => a.sqrt(),
        // wide's exp/ln/trig lose the IEEE edge cases and large-argument accuracy
        _ => f64x4::new(a.to_array().map(|x| op.eval_unary(x))),
    }
}

#[inline]
fn binary_lanes(op: Op, a: f64x4, b: f64x4) -> f64x4 {
    match op {
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a * b,
        Op::Div => a / b,
        _ => {
            let (a, b) = (a.to_array(), b.to_array());
            f64x4::new(std::array::from_fn(|i| op.eval_binary(a[i], b[i])))
        }
    }
}
