//! Function layout decisions made before any instruction is emitted: which
//! stack slot every temporary lives in, and which instructions need a label.

use hashbrown::{HashMap, HashSet};
use log::debug;

use crate::{
    error::{InternalError, internal_error},
    index::Index,
    middle::{
        lir::{self, Edge, InstructionId, InstructionKind, Variable},
        ty::SCALAR_WIDTH,
    },
};

/// Rounds a slot count up to an even number, so that the frame keeps `rsp`
/// 16-byte aligned
pub fn frame_size(num_temporaries: usize) -> u64 {
    let slots = num_temporaries.next_multiple_of(2) as u64;
    slots * SCALAR_WIDTH
}

/// Assigns every temporary of a function an 8-byte slot below `rbp`. Slot
/// `i + 1` holds local `i`. Address variables follow the locals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    offsets: HashMap<Variable, u64>,
    size: u64,
}

impl StackFrame {
    pub fn new(function: &lir::FunctionDefinition) -> Self {
        let num_locals = function.num_locals();

        let locals = function
            .locals
            .indices()
            .map(|id| (Variable::Local(id), id.index() + 1));
        let addresses = function
            .addresses
            .indices()
            .map(|id| (Variable::Address(id), num_locals + id.index() + 1));

        let offsets = locals
            .chain(addresses)
            .map(|(variable, slot)| (variable, slot as u64 * SCALAR_WIDTH))
            .collect();

        let size = frame_size(function.num_temporaries());
        debug!(
            "frame of `{}`: {} temporaries in {size} bytes",
            function.symbol_name,
            function.num_temporaries()
        );

        Self { offsets, size }
    }

    /// Bytes reserved below the saved frame pointer
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Distance of the variable's slot below `rbp`
    pub fn offset_of(&self, variable: impl Into<Variable>) -> Result<u64, InternalError> {
        let variable = variable.into();

        self.offsets
            .get(&variable)
            .copied()
            .ok_or_else(|| internal_error!("no stack slot assigned to {variable}"))
    }
}

/// Instructions reachable from the entry, in depth first order
pub fn reachable_instructions(function: &lir::FunctionDefinition) -> Vec<InstructionId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut work_list = vec![function.entry];

    while let Some(id) = work_list.pop() {
        if !visited.insert(id) {
            continue;
        }

        order.push(id);
        // the fall-through is explored first
        let successors = function.instruction(id).successors().collect::<Vec<_>>();
        work_list.extend(successors.into_iter().rev());
    }

    order
}

/// Picks the instructions which can be reached by anything other than falling
/// through from a single predecessor: merge points (more than one incoming
/// edge, with the function entry counting as one) and the taken side of every
/// `Jump`. Only reachable code is considered.
///
/// Labels are numbered in arena order, so the result only depends on the
/// shape of the graph.
pub fn assign_labels(function: &lir::FunctionDefinition) -> HashMap<InstructionId, String> {
    let reachable = reachable_instructions(function);

    let mut in_degree = HashMap::<InstructionId, usize>::new();
    let mut jump_targets = HashSet::new();

    *in_degree.entry(function.entry).or_default() += 1;

    for &id in &reachable {
        let instruction = function.instruction(id);

        for successor in instruction.successors() {
            *in_degree.entry(successor).or_default() += 1;
        }

        if let InstructionKind::Jump { .. } = instruction.kind
            && let Some(taken) = instruction.next(Edge::True)
        {
            jump_targets.insert(taken);
        }
    }

    let mut labeled = reachable
        .into_iter()
        .filter(|id| in_degree.get(id).is_some_and(|&n| n > 1) || jump_targets.contains(id))
        .collect::<Vec<_>>();
    labeled.sort();

    let labels = labeled
        .into_iter()
        .enumerate()
        .map(|(n, id)| (id, format!(".L{}_{n}", function.symbol_name)))
        .collect::<HashMap<_, _>>();

    debug!("`{}` needs {} labels", function.symbol_name, labels.len());

    labels
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{frontend::intern::InternedSymbol, middle::ty::Type};

    fn function(name: &str) -> lir::FunctionDefinition {
        lir::FunctionDefinition::new(InternedSymbol::new(name), Type::function([], Type::Void))
    }

    /// entry -> jump -(true)-> a -> merge
    ///               -(next)-> b -> merge -> ret
    fn diamond() -> (lir::FunctionDefinition, InstructionId, InstructionId) {
        let mut f = function("diamond");
        let p = f.create_local(Type::Bool);

        let jump = f.push_instruction(InstructionKind::Jump { predicate: p });
        let a = f.push_instruction(InstructionKind::Nop);
        let b = f.push_instruction(InstructionKind::Nop);
        let merge = f.push_instruction(InstructionKind::Nop);
        let ret = f.push_instruction(InstructionKind::Return { value: None });

        f.set_next(f.entry, Edge::Next, jump);
        f.set_next(jump, Edge::True, a);
        f.set_next(jump, Edge::Next, b);
        f.set_next(a, Edge::Next, merge);
        f.set_next(b, Edge::Next, merge);
        f.set_next(merge, Edge::Next, ret);

        (f, a, merge)
    }

    #[test]
    fn frame_size_is_even_slot_count() {
        assert_eq!(frame_size(0), 0);
        assert_eq!(frame_size(1), 16);
        assert_eq!(frame_size(2), 16);
        assert_eq!(frame_size(3), 32);

        let sizes = (0..20).map(frame_size).collect::<Vec<_>>();
        assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
        assert!(sizes.iter().all(|s| s % 16 == 0));
    }

    #[test]
    fn addresses_are_placed_after_locals() {
        let mut f = function("f");
        let a = f.create_local(Type::Int);
        let b = f.create_local(Type::Bool);
        let p = f.create_address(InternedSymbol::new("g"));

        let frame = StackFrame::new(&f);

        assert_eq!(frame.offset_of(a), Ok(8));
        assert_eq!(frame.offset_of(b), Ok(16));
        assert_eq!(frame.offset_of(p), Ok(24));
        assert_eq!(frame.size(), 32);
    }

    #[test]
    fn unknown_variable_has_no_slot() {
        let f = function("f");
        let frame = StackFrame::new(&f);

        assert!(frame.offset_of(lir::LocalVarId::new(3)).is_err());
    }

    #[test]
    fn straight_line_code_needs_no_labels() {
        let mut f = function("line");
        let ret = f.push_instruction(InstructionKind::Return { value: None });
        f.set_next(f.entry, Edge::Next, ret);

        assert!(assign_labels(&f).is_empty());
    }

    #[test]
    fn merge_and_taken_branch_are_labeled() {
        let (f, taken, merge) = diamond();

        let labels = assign_labels(&f);

        assert_eq!(labels.len(), 2);
        assert_eq!(labels[&taken], ".Ldiamond_0");
        assert_eq!(labels[&merge], ".Ldiamond_1");
    }

    #[test]
    fn labeling_is_idempotent() {
        let (f, _, merge) = diamond();

        let first = assign_labels(&f);
        let second = assign_labels(&f);

        assert_eq!(first, second);
        assert_eq!(first[&merge], second[&merge]);
    }

    #[test]
    fn back_edge_into_entry_labels_entry() {
        let mut f = function("spin");
        let nop = f.push_instruction(InstructionKind::Nop);
        f.set_next(f.entry, Edge::Next, nop);
        f.set_next(nop, Edge::Next, f.entry);

        let labels = assign_labels(&f);

        assert_eq!(labels.len(), 1);
        assert!(labels.contains_key(&f.entry));
    }

    #[test]
    fn unreachable_code_does_not_create_merges() {
        let mut f = function("dead");
        let ret = f.push_instruction(InstructionKind::Return { value: None });
        let dead = f.push_instruction(InstructionKind::Nop);
        f.set_next(f.entry, Edge::Next, ret);
        f.set_next(dead, Edge::Next, ret);

        assert!(assign_labels(&f).is_empty());
        assert_eq!(reachable_instructions(&f), vec![f.entry, ret]);
    }
}
