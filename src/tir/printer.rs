//! TIR printer.
//!
//! Output parses back with [`parse_module`](super::parse_module). Registers
//! print by index, so a reparsed function is renumbered but equivalent.

use std::fmt::Write;

use crate::ir::{Function, InstrInfo, Instruction, Module, Operand};

pub fn print_module<I: InstrInfo + ?Sized>(module: &Module, info: &I) -> String {
    let mut out = String::new();
    for (idx, func) in module.functions.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(&print_function(func, info));
    }
    out
}

pub fn print_function<I: InstrInfo + ?Sized>(func: &Function, info: &I) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "func {} {{", func.name);
    for block in &func.blocks {
        let _ = writeln!(out, "{}:", block.name);
        for inst in &block.insts {
            out.push_str("    ");
            print_instruction(&mut out, func, inst, info);
            out.push('\n');
        }
    }
    out.push_str("}\n");
    out
}

fn print_instruction<I: InstrInfo + ?Sized>(
    out: &mut String,
    func: &Function,
    inst: &Instruction,
    info: &I,
) {
    let desc = info.desc(inst.opcode);
    let mut operands = inst.operands.iter();

    if desc.is_some_and(|d| d.num_defs == 1) {
        if let Some(Operand::Reg(result)) = inst.operands.first() {
            let _ = write!(out, "{result} = ");
            operands.next();
        }
    }

    match desc {
        Some(desc) => out.push_str(desc.name),
        None => {
            let _ = write!(out, "{}", inst.opcode);
        }
    }

    for op in operands {
        out.push(' ');
        match *op {
            Operand::Reg(reg) => {
                let _ = write!(out, "{reg}");
            }
            Operand::Imm(value) => {
                let _ = write!(out, "#{value}");
            }
            Operand::Block(target) => match func.blocks.get(target.index()) {
                Some(block) => {
                    let _ = write!(out, "^{}", block.name);
                }
                None => {
                    let _ = write!(out, "^{target}");
                }
            },
        }
    }
}
