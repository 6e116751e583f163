use log::debug;

/// Story memory: one flat byte buffer owned by the interpreter instance.
///
/// Header fields are views over the buffer, not cached copies. Every accessor
/// re-reads memory so that in-place header mutation is observed immediately.
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Wrap a loaded story image. The image must at least contain the
    /// 64-byte header.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Memory, String> {
        if bytes.len() < 64 {
            return Err(format!(
                "story file too small for header: {} bytes",
                bytes.len()
            ));
        }
        let memory = Memory { bytes };
        debug!(
            "loaded story: version {}, {} bytes, initial pc {:#06x}",
            memory.version(),
            memory.len(),
            memory.initial_pc()
        );
        Ok(memory)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn read_byte(&self, addr: usize) -> Result<u8, String> {
        self.bytes
            .get(addr)
            .copied()
            .ok_or_else(|| format!("read of byte {:#06x} past end of memory", addr))
    }

    /// Read a 16-bit big-endian word.
    pub fn read_word(&self, addr: usize) -> Result<u16, String> {
        if addr + 1 >= self.bytes.len() {
            return Err(format!("read of word {:#06x} past end of memory", addr));
        }
        Ok(((self.bytes[addr] as u16) << 8) | self.bytes[addr + 1] as u16)
    }

    /// Write a byte. Writes are only legal below the static memory base.
    pub fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), String> {
        self.check_writable(addr)?;
        self.bytes[addr] = value;
        Ok(())
    }

    /// Write a 16-bit big-endian word into dynamic memory.
    pub fn write_word(&mut self, addr: usize, value: u16) -> Result<(), String> {
        self.check_writable(addr)?;
        self.check_writable(addr + 1)?;
        self.bytes[addr] = (value >> 8) as u8;
        self.bytes[addr + 1] = (value & 0xFF) as u8;
        Ok(())
    }

    fn check_writable(&self, addr: usize) -> Result<(), String> {
        if addr >= self.bytes.len() {
            return Err(format!("write to {:#06x} past end of memory", addr));
        }
        let static_base = self.static_memory_base() as usize;
        if addr >= static_base {
            return Err(format!(
                "write to {:#06x} outside dynamic memory (static base {:#06x})",
                addr, static_base
            ));
        }
        Ok(())
    }

    // Header fields. All multi-byte values are big-endian 16-bit words.

    pub fn version(&self) -> u8 {
        self.bytes[0]
    }

    pub fn flags1(&self) -> u8 {
        self.bytes[0x01]
    }

    pub fn flags2(&self) -> u8 {
        self.bytes[0x10]
    }

    pub fn high_memory_base(&self) -> u16 {
        self.header_word(0x04)
    }

    pub fn initial_pc(&self) -> u16 {
        self.header_word(0x06)
    }

    pub fn dictionary_addr(&self) -> u16 {
        self.header_word(0x08)
    }

    pub fn object_table_addr(&self) -> u16 {
        self.header_word(0x0A)
    }

    pub fn global_table_addr(&self) -> u16 {
        self.header_word(0x0C)
    }

    pub fn static_memory_base(&self) -> u16 {
        self.header_word(0x0E)
    }

    pub fn abbrev_table_addr(&self) -> u16 {
        self.header_word(0x18)
    }

    /// File length in bytes, unscaled from the version-dependent header word.
    pub fn file_length(&self) -> usize {
        let stored = self.header_word(0x1A) as usize;
        match self.version() {
            1..=3 => stored * 2,
            4..=5 => stored * 4,
            _ => stored * 8,
        }
    }

    pub fn checksum(&self) -> u16 {
        self.header_word(0x1C)
    }

    /// Offset applied when unpacking routine addresses in versions 6-7.
    pub fn routines_offset(&self) -> u16 {
        self.header_word(0x28)
    }

    /// Offset applied when unpacking string addresses in versions 6-7.
    pub fn static_strings_offset(&self) -> u16 {
        self.header_word(0x2A)
    }

    /// Custom alphabet table address, or 0 for the default alphabets.
    pub fn alphabet_table_addr(&self) -> u16 {
        self.header_word(0x34)
    }

    fn header_word(&self, addr: usize) -> u16 {
        ((self.bytes[addr] as u16) << 8) | self.bytes[addr + 1] as u16
    }
}
