//! Output, input and the remaining environment opcodes.
//!
//! Everything printed lands in the interpreter's output buffer. Screen
//! control (windows, cursor, styles, colour) and sound are accepted and
//! ignored so programs that use them still run; save and restore report
//! failure the way a story expects when no save medium exists.

use crate::dictionary;
use crate::instruction::Instruction;
use crate::interpreter::{signed, Interpreter};
use crate::text;

/// Terminator code stored by aread.
const TERMINATOR_NEWLINE: u16 = 10;

impl Interpreter {
    pub(crate) fn op_io(&mut self, inst: &Instruction, ops: &[u16]) -> Result<(), String> {
        let name = inst.opcode.name;
        match name {
            "print" => {
                let literal = inst.text.clone().unwrap_or_default();
                self.print(&literal);
                Ok(())
            }
            "print_ret" => {
                let literal = inst.text.clone().unwrap_or_default();
                self.print(&literal);
                self.print("\n");
                self.vm.return_value(1)
            }
            "new_line" => {
                self.print("\n");
                Ok(())
            }
            "print_char" => {
                let code = Self::operand_at(ops, 0, name)?;
                self.print_zscii(code);
                Ok(())
            }
            "print_num" => {
                let value = signed(Self::operand_at(ops, 0, name)?);
                self.print(&value.to_string());
                Ok(())
            }
            "print_addr" => {
                let addr = Self::operand_at(ops, 0, name)? as usize;
                let (string, _) = text::decode_string(&self.vm.memory, addr)?;
                self.print(&string);
                Ok(())
            }
            "print_paddr" => {
                let addr = self.vm.unpack_string_addr(Self::operand_at(ops, 0, name)?);
                let (string, _) = text::decode_string(&self.vm.memory, addr)?;
                self.print(&string);
                Ok(())
            }
            "print_table" => self.op_print_table(ops),
            "print_unicode" => {
                let code = Self::operand_at(ops, 0, name)?;
                let ch = char::from_u32(code as u32).unwrap_or('?');
                self.print(&ch.to_string());
                Ok(())
            }
            "check_unicode" => {
                let code = Self::operand_at(ops, 0, name)?;
                // 3 = can print and read
                let caps = if (32..=126).contains(&code) { 3 } else { 0 };
                self.store_result(inst, caps)
            }
            "sread" | "aread" => self.op_read(inst, ops),
            "read_char" => {
                let line = self.take_pending_input()?;
                let code = match line.chars().next() {
                    Some(ch) => (ch as u32 & 0xFF) as u16,
                    None => TERMINATOR_NEWLINE,
                };
                self.store_result(inst, code)
            }
            "tokenise" => {
                let text_buffer = Self::operand_at(ops, 0, name)? as usize;
                let parse_buffer = Self::operand_at(ops, 1, name)? as usize;
                dictionary::tokenise_buffer(&mut self.vm.memory, text_buffer, parse_buffer)
            }
            "encode_text" => self.op_encode_text(ops),
            "random" => {
                let range = signed(Self::operand_at(ops, 0, name)?);
                let value = if range > 0 {
                    self.rand.gen_range_inclusive(range as u16)
                } else if range < 0 {
                    self.rand.reseed((-range) as u64);
                    0
                } else {
                    self.rand.reseed_entropy();
                    0
                };
                self.store_result(inst, value)
            }
            "verify" => {
                let ok = self.verify_checksum()?;
                self.branch_on(inst, ok)
            }
            // no save medium: the v1-3 forms branch on success, the v4 and
            // extended forms store a result code
            "save" | "restore" => {
                if inst.branch.is_some() {
                    self.branch_on(inst, false)
                } else {
                    self.store_result(inst, 0)
                }
            }
            "save_undo" => self.store_result(inst, 0xFFFF), // -1: not available
            "restore_undo" => self.store_result(inst, 0),
            "set_font" => self.store_result(inst, 0),
            "show_status" | "split_window" | "set_window" | "erase_window" | "erase_line"
            | "set_cursor" | "get_cursor" | "set_text_style" | "buffer_mode" | "output_stream"
            | "input_stream" | "sound_effect" | "set_colour" | "set_true_colour" => Ok(()),
            _ => unreachable!(),
        }
    }

    fn print_zscii(&mut self, code: u16) {
        match code {
            0 => {}
            13 => self.print("\n"),
            32..=126 => {
                let ch = (code as u8) as char;
                self.print(&ch.to_string());
            }
            _ => self.print("?"),
        }
    }

    /// The line input opcode. The pending line is lowercased and stored in
    /// the text buffer, then run through the tokenizer.
    fn op_read(&mut self, inst: &Instruction, ops: &[u16]) -> Result<(), String> {
        let text_buffer = Self::operand_at(ops, 0, "read")? as usize;
        let parse_buffer = ops.get(1).copied().unwrap_or(0) as usize;

        let line = self.take_pending_input()?;
        let line = line.split('\n').next().unwrap_or("").to_lowercase();

        dictionary::parse_input(&mut self.vm.memory, &line, text_buffer, parse_buffer)?;

        if inst.opcode.store {
            self.store_result(inst, TERMINATOR_NEWLINE)?;
        }
        Ok(())
    }

    /// Print a rectangle of ZSCII text: `height` rows of `width` characters,
    /// stepping `skip` extra bytes between rows.
    fn op_print_table(&mut self, ops: &[u16]) -> Result<(), String> {
        let mut addr = Self::operand_at(ops, 0, "print_table")? as usize;
        let width = Self::operand_at(ops, 1, "print_table")? as usize;
        let height = ops.get(2).copied().unwrap_or(1) as usize;
        let skip = ops.get(3).copied().unwrap_or(0) as usize;

        for row in 0..height {
            if row > 0 {
                self.print("\n");
            }
            for col in 0..width {
                let code = self.vm.memory.read_byte(addr + col)? as u16;
                self.print_zscii(code);
            }
            addr += width + skip;
        }
        Ok(())
    }

    /// Encode a span of the text buffer into packed dictionary form.
    fn op_encode_text(&mut self, ops: &[u16]) -> Result<(), String> {
        let text_addr = Self::operand_at(ops, 0, "encode_text")? as usize;
        let length = Self::operand_at(ops, 1, "encode_text")? as usize;
        let from = Self::operand_at(ops, 2, "encode_text")? as usize;
        let dest = Self::operand_at(ops, 3, "encode_text")? as usize;

        let profile = crate::version::VersionProfile::new(self.vm.memory.version());
        let mut word = String::new();
        for i in 0..length.min(profile.dict_text_len) {
            word.push(self.vm.memory.read_byte(text_addr + from + i)? as char);
        }
        while word.chars().count() < profile.dict_text_len {
            word.push('\0');
        }

        let encoded = text::encode_string(self.vm.memory.version(), &word)
            .ok_or_else(|| "encode_text of unencodable text".to_string())?;
        for (i, byte) in encoded.iter().enumerate() {
            self.vm.memory.write_byte(dest + i, *byte)?;
        }
        Ok(())
    }

    fn verify_checksum(&self) -> Result<bool, String> {
        let mem = &self.vm.memory;
        let length = mem.file_length().min(mem.len());
        let mut sum: u32 = 0;
        for addr in 0x40..length {
            sum += mem.read_byte(addr)? as u32;
        }
        Ok((sum & 0xFFFF) as u16 == mem.checksum())
    }
}
