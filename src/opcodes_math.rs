//! Arithmetic, bitwise and comparison opcodes.
//!
//! All arithmetic is signed 16-bit two's complement; overflow wraps.

use crate::instruction::Instruction;
use crate::interpreter::{signed, Interpreter};

impl Interpreter {
    pub(crate) fn op_arith(&mut self, inst: &Instruction, ops: &[u16]) -> Result<(), String> {
        let name = inst.opcode.name;
        let a = Self::operand_at(ops, 0, name)?;
        let value = match name {
            "not" => !a,
            _ => {
                let b = Self::operand_at(ops, 1, name)?;
                match name {
                    "add" => a.wrapping_add(b),
                    "sub" => a.wrapping_sub(b),
                    "mul" => a.wrapping_mul(b),
                    "div" => {
                        if b == 0 {
                            return Err("division by zero".to_string());
                        }
                        signed(a).wrapping_div(signed(b)) as u16
                    }
                    "mod" => {
                        if b == 0 {
                            return Err("modulo by zero".to_string());
                        }
                        signed(a).wrapping_rem(signed(b)) as u16
                    }
                    "and" => a & b,
                    "or" => a | b,
                    "log_shift" => {
                        let places = signed(b);
                        if places >= 0 {
                            a.wrapping_shl(places as u32)
                        } else {
                            a.wrapping_shr((-places) as u32)
                        }
                    }
                    "art_shift" => {
                        let places = signed(b);
                        if places >= 0 {
                            a.wrapping_shl(places as u32)
                        } else {
                            (signed(a) >> (-places).min(15)) as u16
                        }
                    }
                    _ => unreachable!(),
                }
            }
        };
        self.store_result(inst, value)
    }

    /// inc, dec and their branching forms. The operand names a variable;
    /// variable 0 adjusts the top of the stack in place.
    pub(crate) fn op_step_variable(
        &mut self,
        inst: &Instruction,
        ops: &[u16],
    ) -> Result<(), String> {
        let name = inst.opcode.name;
        let var = Self::var_operand(ops, 0, name)?;
        let delta: i16 = if name.starts_with("inc") { 1 } else { -1 };

        let value = signed(self.vm.read_variable_in_place(var)?).wrapping_add(delta);
        self.vm.write_variable_in_place(var, value as u16)?;

        match name {
            "inc_chk" => {
                let limit = signed(Self::operand_at(ops, 1, name)?);
                self.branch_on(inst, value > limit)
            }
            "dec_chk" => {
                let limit = signed(Self::operand_at(ops, 1, name)?);
                self.branch_on(inst, value < limit)
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn op_compare(&mut self, inst: &Instruction, ops: &[u16]) -> Result<(), String> {
        let name = inst.opcode.name;
        let a = Self::operand_at(ops, 0, name)?;
        let condition = match name {
            "jz" => a == 0,
            // je takes up to three values to compare against
            "je" => {
                if ops.len() < 2 {
                    return Err("je needs at least two operands".to_string());
                }
                ops[1..].contains(&a)
            }
            "jl" => signed(a) < signed(Self::operand_at(ops, 1, name)?),
            "jg" => signed(a) > signed(Self::operand_at(ops, 1, name)?),
            "test" => {
                let bits = Self::operand_at(ops, 1, name)?;
                a & bits == bits
            }
            _ => unreachable!(),
        };
        self.branch_on(inst, condition)
    }
}
