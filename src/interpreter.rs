//! The execution engine.
//!
//! `step` decodes and executes one instruction. Input is pulled, not pushed:
//! when an input opcode runs with no line pending, `step` reports
//! `AwaitingInput` without advancing the program counter, the embedder
//! supplies a line, and the next `step` decodes the same instruction again.
//! Output accumulates in a buffer the embedder drains.
//!
//! Opcode handlers live in the `opcodes_*` modules, grouped by the part of
//! the machine they touch; the control opcodes that manipulate the call
//! stack are here.

use crate::instruction::{self, Instruction, Operand};
use crate::memory::Memory;
use crate::vm::{VarRef, VM};
use crate::zrand::ZRand;
use log::debug;

/// What one `step` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Continued,
    /// An input opcode is waiting for a line or keypress.
    AwaitingInput,
    Quit,
}

pub struct Interpreter {
    pub vm: VM,
    pub rand: ZRand,
    /// Pristine story image, for restart.
    initial_image: Vec<u8>,
    output: String,
    pending_input: Option<String>,
}

impl Interpreter {
    pub fn new(memory: Memory, rand: ZRand) -> Interpreter {
        let initial_image = memory.bytes().to_vec();
        Interpreter {
            vm: VM::new(memory),
            rand,
            initial_image,
            output: String::new(),
            pending_input: None,
        }
    }

    /// Queue a line of player input for the pending input opcode.
    pub fn provide_input(&mut self, line: &str) {
        self.pending_input = Some(line.to_string());
    }

    /// Drain everything printed since the last call.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub(crate) fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Decode and execute the instruction at the program counter.
    pub fn step(&mut self) -> Result<StepResult, String> {
        let inst = instruction::decode(&self.vm.memory, self.vm.pc)?;
        if inst.opcode.input && self.pending_input.is_none() {
            return Ok(StepResult::AwaitingInput);
        }
        debug!("{:#06x}: {}", self.vm.pc, inst.opcode.name);
        self.vm.pc = inst.next_addr;
        self.execute(&inst)
    }

    /// Run until the program quits or wants input.
    pub fn run(&mut self) -> Result<StepResult, String> {
        loop {
            match self.step()? {
                StepResult::Continued => {}
                result => return Ok(result),
            }
        }
    }

    /// Resolve operands left to right; reading variable 0 pops the stack.
    fn resolve_operands(&mut self, inst: &Instruction) -> Result<Vec<u16>, String> {
        inst.operands
            .iter()
            .map(|op| match op {
                Operand::Constant(value) => Ok(*value),
                Operand::Variable(var) => self.vm.read_variable(*var),
            })
            .collect()
    }

    pub(crate) fn store_result(&mut self, inst: &Instruction, value: u16) -> Result<(), String> {
        match inst.store_variable {
            Some(var) => self.vm.write_variable(var, value),
            None => Err(format!("{} has no store variable", inst.opcode.name)),
        }
    }

    /// Turn an operand value into the variable reference it names, for the
    /// opcodes that address variables indirectly (inc, dec, load, store,
    /// pull).
    pub(crate) fn var_operand(ops: &[u16], index: usize, name: &str) -> Result<VarRef, String> {
        let value = Self::operand_at(ops, index, name)?;
        if value > 255 {
            return Err(format!("{} names variable {} out of range", name, value));
        }
        Ok(VarRef::from_byte(value as u8))
    }

    pub(crate) fn branch_on(&mut self, inst: &Instruction, condition: bool) -> Result<(), String> {
        match inst.branch {
            Some(branch) => self.vm.apply_branch(branch, condition, inst.next_addr),
            None => Err(format!("{} has no branch descriptor", inst.opcode.name)),
        }
    }

    pub(crate) fn operand_at(ops: &[u16], index: usize, name: &str) -> Result<u16, String> {
        ops.get(index)
            .copied()
            .ok_or_else(|| format!("{} missing operand {}", name, index))
    }

    fn execute(&mut self, inst: &Instruction) -> Result<StepResult, String> {
        let ops = self.resolve_operands(inst)?;
        let op = |i: usize| Self::operand_at(&ops, i, inst.opcode.name);

        match inst.opcode.name {
            // arithmetic and logic
            "add" | "sub" | "mul" | "div" | "mod" | "and" | "or" | "not" | "log_shift"
            | "art_shift" => self.op_arith(inst, &ops)?,
            "inc" | "dec" | "inc_chk" | "dec_chk" => self.op_step_variable(inst, &ops)?,
            "je" | "jl" | "jg" | "jz" | "test" => self.op_compare(inst, &ops)?,

            // objects
            "test_attr" | "set_attr" | "clear_attr" | "jin" | "insert_obj" | "remove_obj"
            | "get_parent" | "get_sibling" | "get_child" | "get_prop" | "get_prop_addr"
            | "get_prop_len" | "get_next_prop" | "put_prop" | "print_obj" => {
                self.op_object(inst, &ops)?
            }

            // memory and tables
            "loadw" | "loadb" | "storew" | "storeb" | "load" | "store" | "push" | "pull"
            | "pop" | "scan_table" | "copy_table" => self.op_memory(inst, &ops)?,

            // output, input and the rest of the world
            "print" | "print_ret" | "new_line" | "print_char" | "print_num" | "print_addr"
            | "print_paddr" | "print_table" | "print_unicode" | "check_unicode" | "sread"
            | "aread" | "read_char" | "tokenise" | "encode_text" | "random" | "verify"
            | "save" | "restore" | "save_undo" | "restore_undo" | "set_font" | "show_status"
            | "split_window" | "set_window" | "erase_window" | "erase_line" | "set_cursor"
            | "get_cursor" | "set_text_style" | "buffer_mode" | "output_stream"
            | "input_stream" | "sound_effect" | "set_colour" | "set_true_colour" => {
                self.op_io(inst, &ops)?
            }

            // control
            "call_vs" | "call_vs2" | "call_1s" | "call_2s" => self.op_call(inst, &ops, true)?,
            "call_vn" | "call_vn2" | "call_1n" | "call_2n" => self.op_call(inst, &ops, false)?,
            "ret" => self.vm.return_value(op(0)?)?,
            "rtrue" => self.vm.return_value(1)?,
            "rfalse" => self.vm.return_value(0)?,
            "ret_popped" => {
                let value = self.vm.pop_stack()?;
                self.vm.return_value(value)?;
            }
            "jump" => {
                self.vm.pc = (inst.next_addr as i64 + op(0)? as i16 as i64 - 2) as usize;
            }
            "check_arg_count" => {
                let wanted = op(0)?;
                let have = self.vm.arg_count() as u16;
                self.branch_on(inst, wanted <= have)?;
            }
            "catch" => {
                let depth = self.vm.call_stack.len() as u16;
                self.store_result(inst, depth)?;
            }
            "throw" => {
                let value = op(0)?;
                let depth = op(1)? as usize;
                if depth == 0 || depth > self.vm.call_stack.len() {
                    return Err(format!("throw to invalid frame {}", depth));
                }
                self.vm.call_stack.truncate(depth);
                self.vm.return_value(value)?;
            }
            "piracy" => self.branch_on(inst, true)?,
            "restart" => self.restart()?,
            "nop" => {}
            "quit" => return Ok(StepResult::Quit),

            name => return Err(format!("unhandled opcode {}", name)),
        }
        Ok(StepResult::Continued)
    }

    /// Shared body of the eight call opcodes. Calling address 0 stores false
    /// without entering anything.
    fn op_call(&mut self, inst: &Instruction, ops: &[u16], stores: bool) -> Result<(), String> {
        let packed = Self::operand_at(ops, 0, inst.opcode.name)?;
        if packed == 0 {
            if stores {
                self.store_result(inst, 0)?;
            }
            return Ok(());
        }
        let addr = self.vm.unpack_routine_addr(packed);
        let result_var = if stores { inst.store_variable } else { None };
        self.vm
            .call_routine(addr, &ops[1..], result_var, inst.next_addr)
    }

    /// Reload the pristine image, keeping the two player-set flag bits.
    fn restart(&mut self) -> Result<(), String> {
        let flags2 = self.vm.memory.read_byte(0x11)? & 0x03;
        let memory = Memory::from_bytes(self.initial_image.clone())?;
        self.vm = VM::new(memory);
        let old = self.vm.memory.read_byte(0x11)?;
        self.vm.memory.write_byte(0x11, (old & !0x03) | flags2)?;
        Ok(())
    }

    pub(crate) fn take_pending_input(&mut self) -> Result<String, String> {
        self.pending_input
            .take()
            .ok_or_else(|| "input opcode executed with no pending input".to_string())
    }
}

pub(crate) fn signed(value: u16) -> i16 {
    value as i16
}
