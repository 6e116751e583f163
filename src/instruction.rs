//! Instruction decoding.
//!
//! An instruction is: opcode (form and count packed into the first byte, or
//! an extended opcode byte), operands, and then whichever of a store
//! variable, branch descriptor and literal text the opcode calls for.

use crate::memory::Memory;
use crate::opcode_tables::{self, Opcode};
use crate::text;
use crate::vm::VarRef;
use log::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionForm {
    Long,
    Short,
    Variable,
    Extended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandCount {
    OP0,
    OP1,
    OP2,
    VAR,
    EXT,
}

/// A decoded operand. Variable values are resolved at execution time
/// because reading the stack reference pops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Constant(u16),
    Variable(VarRef),
}

/// Branch descriptor: where to go (or what to return) when the condition
/// matches `on_true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchInfo {
    pub on_true: bool,
    pub offset: i16,
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    pub form: InstructionForm,
    pub operand_count: OperandCount,
    pub operands: Vec<Operand>,
    pub store_variable: Option<VarRef>,
    pub branch: Option<BranchInfo>,
    pub text: Option<String>,
    /// Address of the first byte past the instruction.
    pub next_addr: usize,
}

const TYPE_LARGE: u8 = 0;
const TYPE_SMALL: u8 = 1;
const TYPE_VARIABLE: u8 = 2;

fn read_operand(mem: &Memory, addr: &mut usize, op_type: u8) -> Result<Option<Operand>, String> {
    let operand = match op_type {
        TYPE_LARGE => {
            let value = mem.read_word(*addr)?;
            *addr += 2;
            Some(Operand::Constant(value))
        }
        TYPE_SMALL => {
            let value = mem.read_byte(*addr)?;
            *addr += 1;
            Some(Operand::Constant(value as u16))
        }
        TYPE_VARIABLE => {
            let var = mem.read_byte(*addr)?;
            *addr += 1;
            Some(Operand::Variable(VarRef::from_byte(var)))
        }
        _ => None,
    };
    Ok(operand)
}

/// Read operands described by a type-selector byte, two bits per operand,
/// stopping at the first omitted slot.
fn read_selector_operands(
    mem: &Memory,
    addr: &mut usize,
    selector: u8,
    operands: &mut Vec<Operand>,
) -> Result<usize, String> {
    let mut read = 0;
    for slot in 0..4 {
        let op_type = (selector >> (6 - 2 * slot)) & 0x3;
        match read_operand(mem, addr, op_type)? {
            Some(op) => {
                operands.push(op);
                read += 1;
            }
            None => break,
        }
    }
    Ok(read)
}

fn read_branch(mem: &Memory, addr: &mut usize) -> Result<BranchInfo, String> {
    let first = mem.read_byte(*addr)?;
    *addr += 1;
    let on_true = first & 0x80 != 0;
    let offset = if first & 0x40 != 0 {
        (first & 0x3F) as i16
    } else {
        let second = mem.read_byte(*addr)?;
        *addr += 1;
        let raw = (((first & 0x3F) as u16) << 8) | second as u16;
        // sign-extend the 14-bit offset
        if raw & 0x2000 != 0 {
            (raw | 0xC000) as i16
        } else {
            raw as i16
        }
    };
    Ok(BranchInfo { on_true, offset })
}

/// Decode the instruction starting at `addr`.
pub fn decode(mem: &Memory, addr: usize) -> Result<Instruction, String> {
    let version = mem.version();
    let first = mem.read_byte(addr)?;
    let mut cursor = addr + 1;

    let form = if first == 0xBE && version >= 5 {
        InstructionForm::Extended
    } else if first & 0xC0 == 0xC0 {
        InstructionForm::Variable
    } else if first & 0xC0 == 0x80 {
        InstructionForm::Short
    } else {
        InstructionForm::Long
    };

    let mut operands = Vec::new();
    let (operand_count, code) = match form {
        InstructionForm::Extended => {
            let code = mem.read_byte(cursor)?;
            cursor += 1;
            let selector = mem.read_byte(cursor)?;
            cursor += 1;
            read_selector_operands(mem, &mut cursor, selector, &mut operands)?;
            (OperandCount::EXT, code)
        }
        InstructionForm::Variable => {
            let code = first & 0x1F;
            let count = if first & 0x20 != 0 {
                OperandCount::VAR
            } else {
                OperandCount::OP2
            };
            let selector = mem.read_byte(cursor)?;
            cursor += 1;
            let read = read_selector_operands(mem, &mut cursor, selector, &mut operands)?;
            // call_vs2 and call_vn2 take a second selector byte, present
            // only when the first byte was fully used
            if count == OperandCount::VAR && (code == 0x0C || code == 0x1A) && read == 4 {
                let selector = mem.read_byte(cursor)?;
                cursor += 1;
                read_selector_operands(mem, &mut cursor, selector, &mut operands)?;
            }
            (count, code)
        }
        InstructionForm::Short => {
            let code = first & 0x0F;
            let op_type = (first >> 4) & 0x3;
            match read_operand(mem, &mut cursor, op_type)? {
                Some(op) => {
                    operands.push(op);
                    (OperandCount::OP1, code)
                }
                None => (OperandCount::OP0, code),
            }
        }
        InstructionForm::Long => {
            let code = first & 0x1F;
            for bit in [0x40, 0x20] {
                let op_type = if first & bit != 0 {
                    TYPE_VARIABLE
                } else {
                    TYPE_SMALL
                };
                if let Some(op) = read_operand(mem, &mut cursor, op_type)? {
                    operands.push(op);
                }
            }
            (OperandCount::OP2, code)
        }
    };

    let opcode = opcode_tables::lookup(version, operand_count, code).ok_or_else(|| {
        format!(
            "illegal opcode {:#04x} ({:?}) at {:#06x} in version {}",
            code, operand_count, addr, version
        )
    })?;

    let store_variable = if opcode.store {
        let var = mem.read_byte(cursor)?;
        cursor += 1;
        Some(VarRef::from_byte(var))
    } else {
        None
    };

    let branch = if opcode.branch {
        Some(read_branch(mem, &mut cursor)?)
    } else {
        None
    };

    let text = if opcode.text {
        let (string, next) = text::decode_string(mem, cursor)?;
        cursor = next;
        Some(string)
    } else {
        None
    };

    trace!(
        "decoded {} at {:#06x}: {:?} store={:?} branch={:?}",
        opcode.name,
        addr,
        operands,
        store_variable,
        branch
    );

    Ok(Instruction {
        opcode,
        form,
        operand_count,
        operands,
        store_variable,
        branch,
        text,
        next_addr: cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StoryBuilder;

    fn story(code: &[u8]) -> (Memory, usize) {
        let mut b = StoryBuilder::new(3);
        b.code(code);
        let mem = b.build();
        let pc = mem.initial_pc() as usize;
        (mem, pc)
    }

    #[test]
    fn test_long_form_small_constants() {
        // add 2 3 -> sp
        let (mem, pc) = story(&[0x14, 0x02, 0x03, 0x00]);
        let inst = decode(&mem, pc).unwrap();
        assert_eq!(inst.opcode.name, "add");
        assert_eq!(inst.form, InstructionForm::Long);
        assert_eq!(
            inst.operands,
            vec![Operand::Constant(2), Operand::Constant(3)]
        );
        assert_eq!(inst.store_variable, Some(VarRef::Stack));
        assert_eq!(inst.next_addr, pc + 4);
    }

    #[test]
    fn test_long_form_variable_operand() {
        // je local1 local2 ?label
        let (mem, pc) = story(&[0x61, 0x01, 0x02, 0xC4]);
        let inst = decode(&mem, pc).unwrap();
        assert_eq!(inst.opcode.name, "je");
        assert_eq!(
            inst.operands,
            vec![
                Operand::Variable(VarRef::Local(1)),
                Operand::Variable(VarRef::Local(2))
            ]
        );
        let branch = inst.branch.unwrap();
        assert!(branch.on_true);
        assert_eq!(branch.offset, 4);
    }

    #[test]
    fn test_short_form_zero_operand() {
        let (mem, pc) = story(&[0xBA]); // quit
        let inst = decode(&mem, pc).unwrap();
        assert_eq!(inst.opcode.name, "quit");
        assert_eq!(inst.operand_count, OperandCount::OP0);
        assert!(inst.operands.is_empty());
    }

    #[test]
    fn test_short_form_one_operand() {
        // jz #1234 ?~label (long branch)
        let (mem, pc) = story(&[0x80, 0x12, 0x34, 0x3F, 0xFF]);
        let inst = decode(&mem, pc).unwrap();
        assert_eq!(inst.opcode.name, "jz");
        assert_eq!(inst.operands, vec![Operand::Constant(0x1234)]);
        let branch = inst.branch.unwrap();
        assert!(!branch.on_true);
        // 14-bit offset 0x1FFF stays positive
        assert_eq!(branch.offset, 0x1FFF);
    }

    #[test]
    fn test_branch_negative_offset_sign_extends() {
        // jz sp ?label with 14-bit offset -4 (0x3FFC)
        let (mem, pc) = story(&[0xA0, 0x00, 0xBF, 0xFC]);
        let inst = decode(&mem, pc).unwrap();
        let branch = inst.branch.unwrap();
        assert!(branch.on_true);
        assert_eq!(branch.offset, -4);
    }

    #[test]
    fn test_variable_form_mixed_operands() {
        // call_vs 0x0800 sp #05 -> local1
        let (mem, pc) = story(&[0xE0, 0x27, 0x08, 0x00, 0x00, 0x05, 0x01]);
        let inst = decode(&mem, pc).unwrap();
        assert_eq!(inst.opcode.name, "call_vs");
        assert_eq!(
            inst.operands,
            vec![
                Operand::Constant(0x0800),
                Operand::Variable(VarRef::Stack),
                Operand::Constant(5)
            ]
        );
        assert_eq!(inst.store_variable, Some(VarRef::Local(1)));
    }

    #[test]
    fn test_variable_form_of_two_operand_opcode() {
        // add as VAR form: 0xC0 | 0x14
        let (mem, pc) = story(&[0xD4, 0x5F, 0x07, 0x08, 0x00]);
        let inst = decode(&mem, pc).unwrap();
        assert_eq!(inst.opcode.name, "add");
        assert_eq!(inst.operand_count, OperandCount::OP2);
        assert_eq!(
            inst.operands,
            vec![Operand::Constant(7), Operand::Constant(8)]
        );
    }

    #[test]
    fn test_print_literal_text() {
        // print "hello"
        let (mem, pc) = story(&[0xB2, 0x35, 0x51, 0xC6, 0x85]);
        let inst = decode(&mem, pc).unwrap();
        assert_eq!(inst.opcode.name, "print");
        assert_eq!(inst.text.as_deref(), Some("hello"));
        assert_eq!(inst.next_addr, pc + 5);
    }

    #[test]
    fn test_call_vs2_second_selector() {
        let mut b = StoryBuilder::new(5);
        // call_vs2 with 6 small-constant operands
        b.code(&[0xEC, 0x55, 0x5F, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x00]);
        let mem = b.build();
        let inst = decode(&mem, mem.initial_pc() as usize).unwrap();
        assert_eq!(inst.opcode.name, "call_vs2");
        assert_eq!(inst.operands.len(), 6);
        assert_eq!(inst.store_variable, Some(VarRef::Stack));
    }

    #[test]
    fn test_extended_form() {
        let mut b = StoryBuilder::new(5);
        // log_shift #8 #2 -> sp
        b.code(&[0xBE, 0x02, 0x5F, 0x08, 0x02, 0x00]);
        let mem = b.build();
        let inst = decode(&mem, mem.initial_pc() as usize).unwrap();
        assert_eq!(inst.form, InstructionForm::Extended);
        assert_eq!(inst.opcode.name, "log_shift");
        assert_eq!(inst.operands.len(), 2);
    }

    #[test]
    fn test_version_gated_opcode() {
        // 1OP:0xF is not in v1-4, call_1n in v5
        let (mem, pc) = story(&[0x8F, 0x12, 0x34, 0x00]);
        let inst = decode(&mem, pc).unwrap();
        assert_eq!(inst.opcode.name, "not");

        let mut b = StoryBuilder::new(5);
        b.code(&[0x8F, 0x12, 0x34]);
        let mem = b.build();
        let inst = decode(&mem, mem.initial_pc() as usize).unwrap();
        assert_eq!(inst.opcode.name, "call_1n");
        assert_eq!(inst.store_variable, None);
    }

    #[test]
    fn test_illegal_opcode_is_fatal() {
        let mut b = StoryBuilder::new(3);
        b.code(&[0xBE, 0x02, 0x5F, 0x08, 0x02, 0x00]); // extended needs v5
        let mem = b.build();
        assert!(decode(&mem, mem.initial_pc() as usize).is_err());
    }
}
