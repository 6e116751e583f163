//! Machine state: memory, program counter and the call stack.
//!
//! Each frame owns its evaluation stack, so a routine cannot see or pop
//! values pushed by its caller. Variable 0 addresses the current frame's
//! stack; 1-15 the locals; 16-255 the global table.

use crate::instruction::BranchInfo;
use crate::memory::Memory;
use log::{debug, trace};

pub const MAX_LOCALS: usize = 15;

/// A variable reference, resolved from its raw byte once at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRef {
    Stack,
    /// Local number, 1-15.
    Local(u8),
    /// Zero-based index into the global table.
    Global(u8),
}

impl VarRef {
    pub fn from_byte(var: u8) -> VarRef {
        match var {
            0 => VarRef::Stack,
            1..=15 => VarRef::Local(var),
            _ => VarRef::Global(var - 16),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallFrame {
    pub eval_stack: Vec<u16>,
    pub locals: Vec<u16>,
    pub arg_count: u8,
    /// Where the routine's return value goes; None for call_vn and friends.
    pub result_var: Option<VarRef>,
    pub return_pc: usize,
}

impl CallFrame {
    fn outermost() -> CallFrame {
        CallFrame {
            eval_stack: Vec::new(),
            locals: Vec::new(),
            arg_count: 0,
            result_var: None,
            return_pc: 0,
        }
    }
}

pub struct VM {
    pub memory: Memory,
    pub pc: usize,
    pub call_stack: Vec<CallFrame>,
}

impl VM {
    pub fn new(memory: Memory) -> VM {
        let pc = memory.initial_pc() as usize;
        VM {
            memory,
            pc,
            call_stack: vec![CallFrame::outermost()],
        }
    }

    fn frame(&self) -> &CallFrame {
        self.call_stack.last().unwrap()
    }

    fn frame_mut(&mut self) -> &mut CallFrame {
        self.call_stack.last_mut().unwrap()
    }

    pub fn push_stack(&mut self, value: u16) {
        self.frame_mut().eval_stack.push(value);
    }

    pub fn pop_stack(&mut self) -> Result<u16, String> {
        self.frame_mut()
            .eval_stack
            .pop()
            .ok_or_else(|| "evaluation stack underflow".to_string())
    }

    pub fn arg_count(&self) -> u8 {
        self.frame().arg_count
    }

    /// Read a variable. The stack reference pops the evaluation stack.
    pub fn read_variable(&mut self, var: VarRef) -> Result<u16, String> {
        match var {
            VarRef::Stack => self.pop_stack(),
            VarRef::Local(n) => self
                .frame()
                .locals
                .get(n as usize - 1)
                .copied()
                .ok_or_else(|| format!("read of undeclared local {}", n)),
            VarRef::Global(g) => {
                let addr = self.memory.global_table_addr() as usize + 2 * g as usize;
                self.memory.read_word(addr)
            }
        }
    }

    /// Write a variable. The stack reference pushes onto the evaluation stack.
    pub fn write_variable(&mut self, var: VarRef, value: u16) -> Result<(), String> {
        trace!("write {:?} = {:#06x}", var, value);
        match var {
            VarRef::Stack => {
                self.push_stack(value);
                Ok(())
            }
            VarRef::Local(n) => {
                let frame = self.frame_mut();
                match frame.locals.get_mut(n as usize - 1) {
                    Some(slot) => {
                        *slot = value;
                        Ok(())
                    }
                    None => Err(format!("write of undeclared local {}", n)),
                }
            }
            VarRef::Global(g) => {
                let addr = self.memory.global_table_addr() as usize + 2 * g as usize;
                self.memory.write_word(addr, value)
            }
        }
    }

    /// Indirect variable read, as inc/dec/load use: the stack reference reads
    /// the top of the stack without popping it.
    pub fn read_variable_in_place(&mut self, var: VarRef) -> Result<u16, String> {
        if var == VarRef::Stack {
            self.frame()
                .eval_stack
                .last()
                .copied()
                .ok_or_else(|| "evaluation stack underflow".to_string())
        } else {
            self.read_variable(var)
        }
    }

    /// Indirect variable write: the stack reference replaces the stack top.
    pub fn write_variable_in_place(&mut self, var: VarRef, value: u16) -> Result<(), String> {
        if var == VarRef::Stack {
            match self.frame_mut().eval_stack.last_mut() {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err("evaluation stack underflow".to_string()),
            }
        } else {
            self.write_variable(var, value)
        }
    }

    /// Expand a packed routine address to a byte address. Versions 6-7 add
    /// the routines-offset header word as stored.
    pub fn unpack_routine_addr(&self, packed: u16) -> usize {
        let packed = packed as usize;
        match self.memory.version() {
            1..=3 => 2 * packed,
            4 | 5 => 4 * packed,
            6 | 7 => 4 * packed + self.memory.routines_offset() as usize,
            _ => 8 * packed,
        }
    }

    /// Expand a packed string address to a byte address. Versions 6-7 add
    /// the strings-offset header word as stored.
    pub fn unpack_string_addr(&self, packed: u16) -> usize {
        let packed = packed as usize;
        match self.memory.version() {
            1..=3 => 2 * packed,
            4 | 5 => 4 * packed,
            6 | 7 => 4 * packed + self.memory.static_strings_offset() as usize,
            _ => 8 * packed,
        }
    }

    /// Enter the routine at byte address `addr`. Locals start at their
    /// declared defaults (always zero from v5 on) with arguments overlaid.
    pub fn call_routine(
        &mut self,
        addr: usize,
        args: &[u16],
        result_var: Option<VarRef>,
        return_pc: usize,
    ) -> Result<(), String> {
        let local_count = self.memory.read_byte(addr)? as usize;
        if local_count > MAX_LOCALS {
            return Err(format!(
                "routine at {:#06x} declares {} locals",
                addr, local_count
            ));
        }

        let mut locals = Vec::with_capacity(local_count);
        let code_start = if self.memory.version() <= 4 {
            for i in 0..local_count {
                locals.push(self.memory.read_word(addr + 1 + 2 * i)?);
            }
            addr + 1 + 2 * local_count
        } else {
            locals.resize(local_count, 0);
            addr + 1
        };
        for (slot, arg) in locals.iter_mut().zip(args) {
            *slot = *arg;
        }

        debug!(
            "call routine {:#06x}, {} locals, {} args, depth {}",
            addr,
            local_count,
            args.len(),
            self.call_stack.len()
        );
        self.call_stack.push(CallFrame {
            eval_stack: Vec::new(),
            locals,
            arg_count: args.len().min(255) as u8,
            result_var,
            return_pc,
        });
        self.pc = code_start;
        Ok(())
    }

    /// Leave the current routine, restoring the caller's program counter and
    /// storing the value if the call wanted one.
    pub fn return_value(&mut self, value: u16) -> Result<(), String> {
        if self.call_stack.len() <= 1 {
            return Err("return from the outermost frame".to_string());
        }
        let frame = self.call_stack.pop().unwrap();
        self.pc = frame.return_pc;
        if let Some(var) = frame.result_var {
            self.write_variable(var, value)?;
        }
        Ok(())
    }

    /// Resolve a taken-or-not branch. Offsets 0 and 1 return false or true
    /// from the current routine instead of jumping.
    pub fn apply_branch(
        &mut self,
        branch: BranchInfo,
        condition: bool,
        next_addr: usize,
    ) -> Result<(), String> {
        if condition != branch.on_true {
            self.pc = next_addr;
            return Ok(());
        }
        match branch.offset {
            0 => self.return_value(0),
            1 => self.return_value(1),
            offset => {
                self.pc = (next_addr as i64 + offset as i64 - 2) as usize;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StoryBuilder;

    fn vm(version: u8) -> VM {
        VM::new(StoryBuilder::new(version).build())
    }

    #[test]
    fn test_variable_reference_classes() {
        assert_eq!(VarRef::from_byte(0), VarRef::Stack);
        assert_eq!(VarRef::from_byte(1), VarRef::Local(1));
        assert_eq!(VarRef::from_byte(15), VarRef::Local(15));
        assert_eq!(VarRef::from_byte(16), VarRef::Global(0));
        assert_eq!(VarRef::from_byte(255), VarRef::Global(239));
    }

    #[test]
    fn test_stack_variable_pops_and_pushes() {
        let mut vm = vm(3);
        vm.write_variable(VarRef::Stack, 10).unwrap();
        vm.write_variable(VarRef::Stack, 20).unwrap();
        assert_eq!(vm.read_variable(VarRef::Stack).unwrap(), 20);
        assert_eq!(vm.read_variable(VarRef::Stack).unwrap(), 10);
        assert!(vm.read_variable(VarRef::Stack).is_err());
    }

    #[test]
    fn test_in_place_access_keeps_stack_depth() {
        let mut vm = vm(3);
        vm.push_stack(7);
        assert_eq!(vm.read_variable_in_place(VarRef::Stack).unwrap(), 7);
        vm.write_variable_in_place(VarRef::Stack, 8).unwrap();
        assert_eq!(vm.read_variable(VarRef::Stack).unwrap(), 8);
        assert!(vm.read_variable(VarRef::Stack).is_err());
    }

    #[test]
    fn test_globals_live_in_memory() {
        let mut b = StoryBuilder::new(3);
        b.global(0, 0xBEEF);
        let mut vm = VM::new(b.build());
        assert_eq!(vm.read_variable(VarRef::Global(0)).unwrap(), 0xBEEF);
        vm.write_variable(VarRef::Global(1), 0x1234).unwrap();
        assert_eq!(vm.read_variable(VarRef::Global(1)).unwrap(), 0x1234);
    }

    #[test]
    fn test_call_v3_reads_local_defaults() {
        let mut b = StoryBuilder::new(3);
        // routine at 0x1000: 2 locals defaulting to 0x0A and 0x0B
        b.write_bytes(0x1000, &[0x02, 0x00, 0x0A, 0x00, 0x0B]);
        let mut vm = VM::new(b.build());

        vm.call_routine(0x1000, &[0x99], Some(VarRef::Stack), 0x500)
            .unwrap();
        assert_eq!(vm.pc, 0x1005);
        assert_eq!(vm.read_variable(VarRef::Local(1)).unwrap(), 0x99); // argument overlay
        assert_eq!(vm.read_variable(VarRef::Local(2)).unwrap(), 0x0B); // default kept
        assert_eq!(vm.arg_count(), 1);
    }

    #[test]
    fn test_call_v5_locals_start_zero() {
        let mut b = StoryBuilder::new(5);
        b.write_bytes(0x1000, &[0x03]);
        let mut vm = VM::new(b.build());

        vm.call_routine(0x1000, &[], None, 0x500).unwrap();
        assert_eq!(vm.pc, 0x1001);
        assert_eq!(vm.read_variable(VarRef::Local(3)).unwrap(), 0);
    }

    #[test]
    fn test_return_restores_caller() {
        let mut b = StoryBuilder::new(3);
        b.write_bytes(0x1000, &[0x00]);
        let mut vm = VM::new(b.build());
        vm.push_stack(0xAA); // caller's stack

        vm.call_routine(0x1000, &[], Some(VarRef::Stack), 0x567)
            .unwrap();
        vm.push_stack(0xBB); // callee's stack, discarded on return
        vm.return_value(42).unwrap();

        assert_eq!(vm.pc, 0x567);
        assert_eq!(vm.read_variable(VarRef::Stack).unwrap(), 42);
        assert_eq!(vm.read_variable(VarRef::Stack).unwrap(), 0xAA);
    }

    #[test]
    fn test_return_from_outermost_frame_is_fatal() {
        let mut vm = vm(3);
        assert!(vm.return_value(0).is_err());
    }

    #[test]
    fn test_too_many_locals_is_fatal() {
        let mut b = StoryBuilder::new(5);
        b.write_bytes(0x1000, &[16]);
        let mut vm = VM::new(b.build());
        assert!(vm.call_routine(0x1000, &[], None, 0).is_err());
    }

    #[test]
    fn test_branch_forms() {
        let mut b = StoryBuilder::new(3);
        b.write_bytes(0x1000, &[0x00]);
        let mut vm = VM::new(b.build());

        // untaken branch falls through
        let branch = BranchInfo {
            on_true: true,
            offset: 10,
        };
        vm.apply_branch(branch, false, 0x2000).unwrap();
        assert_eq!(vm.pc, 0x2000);

        // taken branch jumps to next + offset - 2
        vm.apply_branch(branch, true, 0x2000).unwrap();
        assert_eq!(vm.pc, 0x2008);

        // offset 1 returns true from the routine
        vm.call_routine(0x1000, &[], Some(VarRef::Stack), 0x300)
            .unwrap();
        let branch = BranchInfo {
            on_true: true,
            offset: 1,
        };
        vm.apply_branch(branch, true, 0x2000).unwrap();
        assert_eq!(vm.pc, 0x300);
        assert_eq!(vm.read_variable(VarRef::Stack).unwrap(), 1);
    }

    #[test]
    fn test_unpack_addresses_by_version() {
        assert_eq!(vm(3).unpack_routine_addr(0x100), 0x200);
        assert_eq!(vm(5).unpack_routine_addr(0x100), 0x400);
        assert_eq!(vm(8).unpack_routine_addr(0x100), 0x800);
    }

    #[test]
    fn test_v7_unpack_adds_header_offsets() {
        let mut b = StoryBuilder::new(7);
        b.write_bytes(0x28, &[0x00, 0x30]); // routines offset
        b.write_bytes(0x2A, &[0x00, 0x50]); // strings offset
        let vm = VM::new(b.build());
        assert_eq!(vm.unpack_routine_addr(0x100), 0x400 + 0x30);
        assert_eq!(vm.unpack_string_addr(0x100), 0x400 + 0x50);
    }
}
