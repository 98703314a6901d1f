//! Graph-to-program compiler.
//!
//! # Compilation Process
//!
//! 1. **Input indexing**: map each input variable to its position, rejecting
//!    non-variables and repeats
//! 2. **Topological sort**: ancestors of the outputs only, so unreachable
//!    subgraphs are never compiled (and their variables never required)
//! 3. **Liveness**: the position of the last user of every node; outputs
//!    stay live to the end
//! 4. **Emission**: one instruction per node in topological order, with the
//!    slot of a dying operand released before the result slot is taken

use log::debug;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::instruction::Instruction;
use super::{Outputs, Program};
use crate::core::visitor::topological_order;
use crate::{CompileOptions, Context, DiffError, Node, NodeId, Op};

/// Hands out evaluation slots, recycling released ones when enabled.
struct SlotAllocator {
    reuse: bool,
    free: Vec<u32>,
    count: u32,
}

impl SlotAllocator {
    const fn new(reuse: bool) -> Self {
        Self {
            reuse,
            free: Vec::new(),
            count: 0,
        }
    }

    fn take(&mut self) -> u32 {
        if self.reuse
            && let Some(slot) = self.free.pop()
        {
            return slot;
        }
        let slot = self.count;
        self.count += 1;
        slot
    }

    fn release(&mut self, slot: u32) {
        if self.reuse {
            self.free.push(slot);
        }
    }
}

/// Map each input variable to its position.
fn index_inputs(ctx: &Context, inputs: &[NodeId]) -> Result<FxHashMap<NodeId, u32>, DiffError> {
    let mut positions = FxHashMap::default();
    positions.reserve(inputs.len());
    for (position, &id) in inputs.iter().enumerate() {
        if !ctx.node(id)?.is_variable() {
            return Err(DiffError::InvalidInput {
                position,
                reason: "not a variable",
            });
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Input lists are far shorter than u32::MAX"
        )]
        let index = position as u32;
        if positions.insert(id, index).is_some() {
            return Err(DiffError::InvalidInput {
                position,
                reason: "variable listed more than once",
            });
        }
    }
    Ok(positions)
}

pub(super) fn compile_program(
    ctx: &Context,
    outputs: &Outputs,
    inputs: &[NodeId],
    options: &CompileOptions,
) -> Result<Program, DiffError> {
    let positions = index_inputs(ctx, inputs)?;
    let order = topological_order(ctx, &outputs.nodes)?;

    let mut last_use: FxHashMap<NodeId, usize> = FxHashMap::default();
    last_use.reserve(order.len());
    for (i, &id) in order.iter().enumerate() {
        for &arg in ctx.node(id)?.args() {
            last_use.insert(arg, i);
        }
    }
    for &out in &outputs.nodes {
        last_use.insert(out, usize::MAX);
    }

    let mut slots = SlotAllocator::new(options.reuse_slots);
    let mut slot_of: FxHashMap<NodeId, u32> = FxHashMap::default();
    slot_of.reserve(order.len());
    let mut instructions = Vec::with_capacity(order.len());

    for (i, &id) in order.iter().enumerate() {
        let instruction = match ctx.node(id)? {
            Node::Variable { id: var, name } => {
                let Some(&index) = positions.get(&id) else {
                    return Err(DiffError::MissingInputVariable {
                        name: name.to_string(),
                        id: var.get(),
                    });
                };
                Instruction::Input {
                    dst: slots.take(),
                    index,
                }
            }
            Node::Constant(value) => Instruction::Const {
                dst: slots.take(),
                value: *value,
            },
            Node::Operation { op, args } => {
                let src: SmallVec<[u32; 3]> = args.iter().map(|a| slot_of[a]).collect();
                for (k, arg) in args.iter().enumerate() {
                    if last_use.get(arg) == Some(&i) && !args[..k].contains(arg) {
                        slots.release(slot_of[arg]);
                    }
                }
                let dst = slots.take();
                match (*op, src.as_slice()) {
                    (Op::IfElse, &[cond, then, otherwise]) => Instruction::Select {
                        dst,
                        cond,
                        then,
                        otherwise,
                    },
                    (op, &[a]) => Instruction::Unary { op, dst, a },
                    (op, &[a, b]) => Instruction::Binary { op, dst, a, b },
                    (op, _) => {
                        return Err(DiffError::ArityMismatch {
                            op,
                            expected: op.arity(),
                            got: src.len(),
                        });
                    }
                }
            }
        };
        slot_of.insert(id, instruction.dst());
        instructions.push(instruction);
    }

    let output_slots: Box<[u32]> = outputs.nodes.iter().map(|n| slot_of[n]).collect();
    debug!(
        "compiled {} reachable nodes into {} instructions over {} slots ({} inputs, outputs {})",
        order.len(),
        instructions.len(),
        slots.count,
        inputs.len(),
        outputs.shape
    );

    Ok(Program {
        instructions: instructions.into_boxed_slice(),
        outputs: output_slots,
        slot_count: slots.count as usize,
        input_count: inputs.len(),
        shape: outputs.shape,
    })
}
