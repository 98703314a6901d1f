//! Register-machine instruction set.
//!
//! Every instruction writes exactly one slot. Operands are read before the
//! destination is written, so an instruction may name one of its own operand
//! slots as its destination.

use std::fmt;

use crate::Op;

/// A single evaluation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    /// `slots[dst] = inputs[index]`
    Input { dst: u32, index: u32 },
    /// `slots[dst] = value`
    Const { dst: u32, value: f64 },
    /// `slots[dst] = op(slots[a])`
    Unary { op: Op, dst: u32, a: u32 },
    /// `slots[dst] = op(slots[a], slots[b])`
    Binary { op: Op, dst: u32, a: u32, b: u32 },
    /// `slots[dst] = if slots[cond] != 0 { slots[then] } else { slots[otherwise] }`
    Select {
        dst: u32,
        cond: u32,
        then: u32,
        otherwise: u32,
    },
}

impl Instruction {
    /// Slot written by this instruction.
    #[inline]
    #[must_use]
    pub const fn dst(&self) -> u32 {
        match *self {
            Self::Input { dst, .. }
            | Self::Const { dst, .. }
            | Self::Unary { dst, .. }
            | Self::Binary { dst, .. }
            | Self::Select { dst, .. } => dst,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Input { dst, index } => write!(f, "r{} = in[{}]", dst, index),
            Self::Const { dst, value } => write!(f, "r{} = {}", dst, value),
            Self::Unary { op, dst, a } => write!(f, "r{} = {}(r{})", dst, op, a),
            Self::Binary { op, dst, a, b } => write!(f, "r{} = {}(r{}, r{})", dst, op, a, b),
            Self::Select {
                dst,
                cond,
                then,
                otherwise,
            } => write!(f, "r{} = if_else(r{}, r{}, r{})", dst, cond, then, otherwise),
        }
    }
}
