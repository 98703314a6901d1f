//! Scalar execution of a compiled program.
//!
//! Slots live in an inline buffer for small programs and spill to the heap
//! for large ones; a single evaluation performs no other allocation.

use smallvec::{SmallVec, smallvec};

use super::Program;
use super::instruction::Instruction;
use crate::traits::MathScalar;

/// Number of slots kept on the CPU stack before spilling to the heap.
///
/// 32 slots * 8 bytes = 256 bytes for `f64`.
const INLINE_SLOTS: usize = 32;

impl Program {
    /// Run once. `inputs` and `outputs` have already been shape-checked.
    #[inline]
    pub(crate) fn run<T: MathScalar>(&self, inputs: &[T], outputs: &mut [T]) {
        let mut slots: SmallVec<[T; INLINE_SLOTS]> = smallvec![T::zero(); self.slot_count];

        for instruction in &self.instructions {
            match *instruction {
                Instruction::Input { dst, index } => {
                    slots[dst as usize] = inputs[index as usize];
                }
                Instruction::Const { dst, value } => {
                    slots[dst as usize] = T::from_constant(value);
                }
                Instruction::Unary { op, dst, a } => {
                    slots[dst as usize] = op.eval_unary(slots[a as usize]);
                }
                Instruction::Binary { op, dst, a, b } => {
                    slots[dst as usize] = op.eval_binary(slots[a as usize], slots[b as usize]);
                }
                Instruction::Select {
                    dst,
                    cond,
                    then,
                    otherwise,
                } => {
                    slots[dst as usize] = if slots[cond as usize] == T::zero() {
                        slots[otherwise as usize]
                    } else {
                        slots[then as usize]
                    };
                }
            }
        }

        for (out, &slot) in outputs.iter_mut().zip(self.outputs.iter()) {
            *out = slots[slot as usize];
        }
    }
}
