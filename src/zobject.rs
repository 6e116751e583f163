//! Object tree and property tables.
//!
//! Objects are views over fixed-stride slots in memory; nothing is created or
//! destroyed at runtime, only relations and property data change. All layout
//! differences between the compact (v1-3) and wide (v4+) formats come from
//! the VersionProfile.

use crate::memory::Memory;
use crate::text;
use crate::version::VersionProfile;
use log::debug;

/// The three tree relation slots of an object entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Parent,
    Sibling,
    Child,
}

impl Relation {
    fn index(self) -> usize {
        match self {
            Relation::Parent => 0,
            Relation::Sibling => 1,
            Relation::Child => 2,
        }
    }
}

fn profile(mem: &Memory) -> VersionProfile {
    VersionProfile::new(mem.version())
}

/// Value from the property defaults table for the given property number.
pub fn default_property(mem: &Memory, prop: u16) -> Result<u16, String> {
    let p = profile(mem);
    if prop < 1 || prop > p.max_properties as u16 {
        return Err(format!("invalid default property number {}", prop));
    }
    let base = mem.object_table_addr() as usize;
    mem.read_word(base + 2 * (prop as usize - 1))
}

/// Byte address of an object's entry in the object table.
fn object_base(mem: &Memory, obj: u16) -> Result<usize, String> {
    let p = profile(mem);
    if obj < 1 || obj > p.max_objects {
        return Err(format!("invalid object id {}", obj));
    }
    let base = mem.object_table_addr() as usize + p.defaults_table_size();
    Ok(base + p.object_entry_size * (obj as usize - 1))
}

fn attribute_location(mem: &Memory, obj: u16, attr: u16) -> Result<(usize, u8), String> {
    let p = profile(mem);
    if attr >= p.max_attributes {
        return Err(format!(
            "invalid attribute {} for object {} (max {})",
            attr,
            obj,
            p.max_attributes - 1
        ));
    }
    let base = object_base(mem, obj)?;
    Ok((base + (attr >> 3) as usize, 7 - (attr & 0x7) as u8))
}

pub fn attribute(mem: &Memory, obj: u16, attr: u16) -> Result<bool, String> {
    let (addr, bit) = attribute_location(mem, obj, attr)?;
    Ok(mem.read_byte(addr)? & (1 << bit) != 0)
}

pub fn set_attribute(mem: &mut Memory, obj: u16, attr: u16, value: bool) -> Result<(), String> {
    let (addr, bit) = attribute_location(mem, obj, attr)?;
    let byte = mem.read_byte(addr)?;
    let byte = if value {
        byte | (1 << bit)
    } else {
        byte & !(1 << bit)
    };
    mem.write_byte(addr, byte)
}

pub fn relation(mem: &Memory, obj: u16, rel: Relation) -> Result<u16, String> {
    let p = profile(mem);
    let base = object_base(mem, obj)?;
    if p.relation_bytes == 1 {
        Ok(mem.read_byte(base + p.relations_offset + rel.index())? as u16)
    } else {
        mem.read_word(base + p.relations_offset + 2 * rel.index())
    }
}

pub fn set_relation(mem: &mut Memory, obj: u16, rel: Relation, target: u16) -> Result<(), String> {
    let p = profile(mem);
    if target > p.max_objects {
        return Err(format!("invalid relation target {}", target));
    }
    let base = object_base(mem, obj)?;
    if p.relation_bytes == 1 {
        mem.write_byte(base + p.relations_offset + rel.index(), target as u8)
    } else {
        mem.write_word(base + p.relations_offset + 2 * rel.index(), target)
    }
}

/// Move `obj` to become the first child of `dest` (or parentless if `dest`
/// is 0), detaching it from its old parent's child chain.
pub fn move_object(mem: &mut Memory, obj: u16, dest: u16) -> Result<(), String> {
    debug!("move object {} under {}", obj, dest);
    let p = profile(mem);

    let parent = relation(mem, obj, Relation::Parent)?;
    if parent != 0 {
        let sibling = relation(mem, obj, Relation::Sibling)?;
        let mut node = relation(mem, parent, Relation::Child)?;
        if node == obj {
            set_relation(mem, parent, Relation::Child, sibling)?;
        } else {
            // walk the chain to find the predecessor of obj
            let mut steps = 0;
            loop {
                let next = relation(mem, node, Relation::Sibling)?;
                if next == obj {
                    break;
                }
                node = next;
                steps += 1;
                if node == 0 || steps > p.max_objects {
                    return Err(format!(
                        "object {} not found in child chain of parent {}",
                        obj, parent
                    ));
                }
            }
            set_relation(mem, node, Relation::Sibling, sibling)?;
        }
    }

    if dest != 0 {
        let dest_child = relation(mem, dest, Relation::Child)?;
        set_relation(mem, obj, Relation::Sibling, dest_child)?;
        set_relation(mem, dest, Relation::Child, obj)?;
    } else {
        set_relation(mem, obj, Relation::Sibling, 0)?;
    }

    set_relation(mem, obj, Relation::Parent, dest)
}

/// Address of an object's property table.
pub fn properties_addr(mem: &Memory, obj: u16) -> Result<usize, String> {
    let p = profile(mem);
    let base = object_base(mem, obj)?;
    Ok(mem.read_word(base + p.properties_offset)? as usize)
}

/// The object's short name from the head of its property table.
pub fn object_name(mem: &Memory, obj: u16) -> Result<String, String> {
    let addr = properties_addr(mem, obj)?;
    let (name, _) = text::decode_string(mem, addr + 1)?;
    Ok(name)
}

/// Address of the first property record, past the length-prefixed name.
fn first_property_addr(mem: &Memory, obj: u16) -> Result<usize, String> {
    let addr = properties_addr(mem, obj)?;
    let name_words = mem.read_byte(addr)? as usize;
    Ok(addr + 1 + 2 * name_words)
}

/// Property number of the record starting at `addr`, 0 at the terminator.
fn property_number(mem: &Memory, addr: usize) -> Result<u16, String> {
    let size_byte = mem.read_byte(addr)?;
    if size_byte == 0 {
        return Ok(0);
    }
    if mem.version() <= 3 {
        Ok((size_byte & 0x1F) as u16)
    } else {
        Ok((size_byte & 0x3F) as u16)
    }
}

/// Address of the data span of the record starting at `addr`.
fn property_data_addr(mem: &Memory, addr: usize) -> Result<usize, String> {
    if mem.version() <= 3 || mem.read_byte(addr)? & 0x80 == 0 {
        Ok(addr + 1)
    } else {
        Ok(addr + 2)
    }
}

/// Data length of the record starting at `addr`.
fn property_data_len(mem: &Memory, addr: usize) -> Result<usize, String> {
    let size_byte = mem.read_byte(addr)?;
    if mem.version() <= 3 {
        Ok(1 + (size_byte >> 5) as usize)
    } else if size_byte & 0x80 != 0 {
        let len = (mem.read_byte(addr + 1)? & 0x3F) as usize;
        Ok(if len == 0 { 64 } else { len })
    } else if size_byte & 0x40 != 0 {
        Ok(2)
    } else {
        Ok(1)
    }
}

/// Data length recovered from a data address, as get_prop_len requires.
/// The size byte (or second size byte, v4+) always directly precedes the data.
pub fn property_len_from_data_addr(mem: &Memory, data_addr: usize) -> Result<u16, String> {
    if data_addr == 0 {
        return Err("property length of address 0".to_string());
    }
    let size_byte = mem.read_byte(data_addr - 1)?;
    if mem.version() <= 3 {
        Ok(1 + (size_byte >> 5) as u16)
    } else if size_byte & 0x80 != 0 {
        let len = (size_byte & 0x3F) as u16;
        Ok(if len == 0 { 64 } else { len })
    } else if size_byte & 0x40 != 0 {
        Ok(2)
    } else {
        Ok(1)
    }
}

/// Find the record for `prop` on `obj`, relying on descending property
/// numbers. Returns 0 when the object has no such property.
fn property_addr(mem: &Memory, obj: u16, prop: u16) -> Result<usize, String> {
    let mut addr = first_property_addr(mem, obj)?;
    let mut number = property_number(mem, addr)?;
    while number > prop {
        addr = property_data_addr(mem, addr)? + property_data_len(mem, addr)?;
        number = property_number(mem, addr)?;
    }
    if number == prop {
        Ok(addr)
    } else {
        Ok(0)
    }
}

/// Byte address of the property data, or 0 when absent (get_prop_addr).
pub fn property_data_addr_of(mem: &Memory, obj: u16, prop: u16) -> Result<u16, String> {
    let addr = property_addr(mem, obj, prop)?;
    if addr == 0 {
        Ok(0)
    } else {
        Ok(property_data_addr(mem, addr)? as u16)
    }
}

/// Declared property value as a word, or None when the object lacks the
/// property. Reads one byte for length-1 properties, else the leading word.
pub fn property_value(mem: &Memory, obj: u16, prop: u16) -> Result<Option<u16>, String> {
    let addr = property_addr(mem, obj, prop)?;
    if addr == 0 {
        return Ok(None);
    }
    let data_addr = property_data_addr(mem, addr)?;
    let value = if property_data_len(mem, addr)? == 1 {
        mem.read_byte(data_addr)? as u16
    } else {
        mem.read_word(data_addr)?
    };
    Ok(Some(value))
}

/// First (highest-numbered) property of an object.
pub fn first_property_number(mem: &Memory, obj: u16) -> Result<u16, String> {
    let addr = first_property_addr(mem, obj)?;
    property_number(mem, addr)
}

/// Successor in the descending property order. Asking for the successor of a
/// property the object does not declare is fatal.
pub fn next_property_number(mem: &Memory, obj: u16, prop: u16) -> Result<u16, String> {
    let addr = property_addr(mem, obj, prop)?;
    if addr == 0 {
        return Err(format!(
            "get_next_prop of nonexistent property {} on object {}",
            prop, obj
        ));
    }
    let next = property_data_addr(mem, addr)? + property_data_len(mem, addr)?;
    property_number(mem, next)
}

/// Write a property value in place. Writing to an undeclared property is
/// fatal; 1-byte properties take the low byte of the value.
pub fn set_property(mem: &mut Memory, obj: u16, prop: u16, value: u16) -> Result<(), String> {
    let addr = property_addr(mem, obj, prop)?;
    if addr == 0 {
        return Err(format!(
            "put_prop of nonexistent property {} on object {}",
            prop, obj
        ));
    }
    let data_addr = property_data_addr(mem, addr)?;
    if property_data_len(mem, addr)? == 1 {
        mem.write_byte(data_addr, (value & 0xFF) as u8)
    } else {
        mem.write_word(data_addr, value)
    }
}
