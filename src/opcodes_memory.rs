//! Memory, table and stack opcodes.
//!
//! Table addresses are computed in 16-bit arithmetic and wrap, matching how
//! compiled programs index with negative offsets.

use crate::instruction::Instruction;
use crate::interpreter::{signed, Interpreter};

impl Interpreter {
    pub(crate) fn op_memory(&mut self, inst: &Instruction, ops: &[u16]) -> Result<(), String> {
        let name = inst.opcode.name;
        match name {
            "loadw" => {
                let addr = Self::operand_at(ops, 0, name)?
                    .wrapping_add(Self::operand_at(ops, 1, name)?.wrapping_mul(2));
                let value = self.vm.memory.read_word(addr as usize)?;
                self.store_result(inst, value)
            }
            "loadb" => {
                let addr = Self::operand_at(ops, 0, name)?
                    .wrapping_add(Self::operand_at(ops, 1, name)?);
                let value = self.vm.memory.read_byte(addr as usize)? as u16;
                self.store_result(inst, value)
            }
            "storew" => {
                let addr = Self::operand_at(ops, 0, name)?
                    .wrapping_add(Self::operand_at(ops, 1, name)?.wrapping_mul(2));
                let value = Self::operand_at(ops, 2, name)?;
                self.vm.memory.write_word(addr as usize, value)
            }
            "storeb" => {
                let addr = Self::operand_at(ops, 0, name)?
                    .wrapping_add(Self::operand_at(ops, 1, name)?);
                let value = Self::operand_at(ops, 2, name)?;
                self.vm.memory.write_byte(addr as usize, value as u8)
            }
            // load and store name a variable; variable 0 peeks or replaces
            // the stack top rather than popping and pushing
            "load" => {
                let var = Self::var_operand(ops, 0, name)?;
                let value = self.vm.read_variable_in_place(var)?;
                self.store_result(inst, value)
            }
            "store" => {
                let var = Self::var_operand(ops, 0, name)?;
                let value = Self::operand_at(ops, 1, name)?;
                self.vm.write_variable_in_place(var, value)
            }
            "push" => {
                let value = Self::operand_at(ops, 0, name)?;
                self.vm.push_stack(value);
                Ok(())
            }
            "pull" => {
                let var = Self::var_operand(ops, 0, name)?;
                let value = self.vm.pop_stack()?;
                self.vm.write_variable_in_place(var, value)
            }
            "pop" => {
                self.vm.pop_stack()?;
                Ok(())
            }
            "scan_table" => self.op_scan_table(inst, ops),
            "copy_table" => self.op_copy_table(ops),
            _ => unreachable!(),
        }
    }

    /// Search a table for a value, storing the address of the hit (or 0) and
    /// branching on success. The optional form operand selects word or byte
    /// entries in its top bit and the entry stride in the rest.
    fn op_scan_table(&mut self, inst: &Instruction, ops: &[u16]) -> Result<(), String> {
        let target = Self::operand_at(ops, 0, "scan_table")?;
        let mut addr = Self::operand_at(ops, 1, "scan_table")?;
        let count = Self::operand_at(ops, 2, "scan_table")?;
        let form = ops.get(3).copied().unwrap_or(0x82) as u8;
        let words = form & 0x80 != 0;
        let stride = (form & 0x7F) as u16;
        if stride == 0 {
            return Err("scan_table with zero entry size".to_string());
        }

        let mut found = 0u16;
        for _ in 0..count {
            let entry = if words {
                self.vm.memory.read_word(addr as usize)?
            } else {
                self.vm.memory.read_byte(addr as usize)? as u16
            };
            if entry == target {
                found = addr;
                break;
            }
            addr = addr.wrapping_add(stride);
        }

        self.store_result(inst, found)?;
        self.branch_on(inst, found != 0)
    }

    /// Copy `size` bytes between tables. A destination of 0 zeroes the
    /// source instead. A negative size forces a forward byte-by-byte copy
    /// even when the ranges overlap destructively.
    fn op_copy_table(&mut self, ops: &[u16]) -> Result<(), String> {
        let src = Self::operand_at(ops, 0, "copy_table")?;
        let dst = Self::operand_at(ops, 1, "copy_table")?;
        let size = signed(Self::operand_at(ops, 2, "copy_table")?);

        if dst == 0 {
            for i in 0..size.unsigned_abs() {
                self.vm.memory.write_byte(src.wrapping_add(i) as usize, 0)?;
            }
            return Ok(());
        }

        if size < 0 {
            for i in 0..size.unsigned_abs() {
                let byte = self.vm.memory.read_byte(src.wrapping_add(i) as usize)?;
                self.vm.memory.write_byte(dst.wrapping_add(i) as usize, byte)?;
            }
        } else {
            // read everything first so overlapping ranges copy cleanly
            let mut buffer = Vec::with_capacity(size as usize);
            for i in 0..size as u16 {
                buffer.push(self.vm.memory.read_byte(src.wrapping_add(i) as usize)?);
            }
            for (i, byte) in buffer.into_iter().enumerate() {
                self.vm
                    .memory
                    .write_byte(dst.wrapping_add(i as u16) as usize, byte)?;
            }
        }
        Ok(())
    }
}
