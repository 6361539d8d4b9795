//! Memory and stack decomposition
//!
//! Memory access splits into address nibbles and data nibbles with no carries
//! between them; one check component folds the per-nibble address range flags.
//! Stack operations move the stack pointer with a constant-addend carry chain.

use super::arith::{Addend, CarryChain, FinalCarry};
use super::{export_copy, NibbleClauses, PlanBuilder};
use crate::contract::{CarryFlags, ComponentKind, Expr, Role, VariableId};
use crate::isa::{MemoryAccess, MemorySpace, StackOp};

pub(crate) fn build_memory(
    builder: &mut PlanBuilder,
    access: MemoryAccess,
    space: MemorySpace,
    word_bytes: u8,
    memory_address_bits: u8,
) {
    let kind = builder.kind();
    let width = builder.width();
    let alignment_bits = word_bytes.trailing_zeros();

    // Address nibbles: latch the address onto the bus and flag the nibble in range
    for n in 0..width {
        let mut clauses = NibbleClauses::default();
        export_copy(&mut clauses, kind, n, Role::BusAddress, Role::Address);

        let must_be_zero = (0..4u8).filter(|&off| {
            let bit = n as u32 * 4 + off as u32;
            bit < alignment_bits || bit >= memory_address_bits as u32
        });
        let in_range = Expr::all(
            must_be_zero.map(|off| Expr::not(Expr::var(VariableId::bit(kind, n, Role::Address(off))))),
        );
        clauses.export(VariableId::flag(kind, n, Role::InRange), in_range);

        let name = builder.nibble_name(Some("addr"), n);
        builder.push_nibble(clauses.into_nibble(name, n, CarryFlags::default()));
    }

    // Data nibbles
    for n in 0..width {
        let mut clauses = NibbleClauses::default();
        match access {
            MemoryAccess::Read => export_copy(&mut clauses, kind, n, Role::Result, Role::Value),
            MemoryAccess::Write => export_copy(&mut clauses, kind, n, Role::BusData, Role::Value),
        }
        let name = builder.nibble_name(Some("data"), n);
        builder.push_nibble(clauses.into_nibble(name, n, CarryFlags::default()));
    }

    let mut bounds = NibbleClauses::default();
    for n in 0..width {
        bounds.assume_boolean(VariableId::flag(kind, n, Role::InRange));
    }
    bounds.export(
        VariableId::instruction(kind, Role::Ok),
        Expr::all((0..width).map(|n| Expr::var(VariableId::flag(kind, n, Role::InRange)))),
    );
    if space == MemorySpace::Secondary {
        bounds.export(VariableId::instruction(kind, Role::Select), Expr::constant(true));
    }
    builder.push_extra(bounds.into_standalone(format!("{}_bounds", kind.prefix()), ComponentKind::Check));
}

pub(crate) fn build_stack(builder: &mut PlanBuilder, op: StackOp, word_bytes: u8) {
    let kind = builder.kind();
    let width = builder.width();

    if op == StackOp::Swap {
        for n in 0..width {
            let mut clauses = NibbleClauses::default();
            export_copy(&mut clauses, kind, n, Role::Result, Role::OperandB);
            export_copy(&mut clauses, kind, n, Role::Second, Role::OperandA);
            let name = builder.nibble_name(None, n);
            builder.push_nibble(clauses.into_nibble(name, n, CarryFlags::default()));
        }
        return;
    }

    let step = word_bytes as u64;
    let addend = match op {
        StackOp::Pop => Addend::Constant(step.wrapping_neg()),
        _ => Addend::Constant(step),
    };
    let chain = CarryChain {
        augend: Role::StackPointer,
        addend,
        sum: Role::NextStackPointer,
        initial_carry: false,
        final_carry: FinalCarry::Discard,
    };
    chain.build(builder, Some("sp"), |_, _| {});

    for n in 0..width {
        let mut clauses = NibbleClauses::default();
        match op {
            StackOp::Pop => export_copy(&mut clauses, kind, n, Role::Value, Role::Slot),
            _ => export_copy(&mut clauses, kind, n, Role::Slot, Role::Value),
        }
        let name = builder.nibble_name(Some("data"), n);
        builder.push_nibble(clauses.into_nibble(name, n, CarryFlags::default()));
    }
}

#[cfg(test)]
mod tests {
    use crate::contract::{ComponentKind, Role, VariableId};
    use crate::decompose::NibbleDecomposer;
    use crate::isa::InstructionKind;

    #[test]
    fn test_memory_plan_layout() {
        let plan = NibbleDecomposer::with_width(8)
            .unwrap()
            .decompose(InstructionKind::Load)
            .unwrap();
        assert_eq!(plan.components.len(), 17);
        assert!(plan.links.is_empty());
        assert_eq!(plan.components[0].name(), "load_addr_nibble_0");
        assert_eq!(plan.components[8].name(), "load_data_nibble_0");
        let bounds = &plan.components[16];
        assert_eq!(bounds.name(), "load_bounds");
        assert_eq!(bounds.kind, ComponentKind::Check);
        // consumes the range flag of every address nibble
        for n in 0..8 {
            assert!(bounds
                .contract
                .variables()
                .contains(&VariableId::flag(InstructionKind::Load, n, Role::InRange)));
        }
    }

    #[test]
    fn test_range_flags() {
        let plan = NibbleDecomposer::with_width(8)
            .unwrap()
            .decompose(InstructionKind::Store)
            .unwrap();
        let text = plan.components[0].contract.expression();
        assert!(text.ends_with("store_ir0=(store_ad0'&store_ad1')"), "{text}");
        // bits 4..15 are addressable
        assert!(plan.components[2].contract.expression().ends_with("store_ir2=1"));
        assert!(plan.components[4]
            .contract
            .expression()
            .ends_with("store_ir4=(store_ad16'&store_ad17'&store_ad18'&store_ad19')"));
    }

    #[test]
    fn test_secondary_space_selects() {
        let plan = NibbleDecomposer::with_width(8)
            .unwrap()
            .decompose(InstructionKind::Mstore)
            .unwrap();
        let bounds = plan.component("mstore_bounds").unwrap();
        assert!(bounds.contract.expression().ends_with("mstore_sel=1"));
    }

    #[test]
    fn test_stack_plans() {
        let decomposer = NibbleDecomposer::with_width(8).unwrap();
        let push = decomposer.decompose(InstructionKind::Push).unwrap();
        assert_eq!(push.links.len(), 7);
        assert_eq!(push.nibble_components().count(), 16);
        assert_eq!(push.components[0].name(), "push_sp_nibble_0");
        assert_eq!(push.components[8].name(), "push_data_nibble_0");
        assert_eq!(push.components[16].name(), "push_link_0_to_1");

        let swap = decomposer.decompose(InstructionKind::Swap).unwrap();
        assert_eq!(swap.components.len(), 8);
        assert!(swap.links.is_empty());
    }
}
