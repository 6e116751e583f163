//! Object tree and property opcodes, thin wrappers over the zobject layer.

use crate::instruction::Instruction;
use crate::interpreter::Interpreter;
use crate::zobject::{self, Relation};

impl Interpreter {
    pub(crate) fn op_object(&mut self, inst: &Instruction, ops: &[u16]) -> Result<(), String> {
        let name = inst.opcode.name;
        let obj = Self::operand_at(ops, 0, name)?;
        let mem = &mut self.vm.memory;

        match name {
            "test_attr" => {
                let attr = Self::operand_at(ops, 1, name)?;
                let set = zobject::attribute(mem, obj, attr)?;
                self.branch_on(inst, set)
            }
            "set_attr" => {
                let attr = Self::operand_at(ops, 1, name)?;
                zobject::set_attribute(mem, obj, attr, true)
            }
            "clear_attr" => {
                let attr = Self::operand_at(ops, 1, name)?;
                zobject::set_attribute(mem, obj, attr, false)
            }
            "jin" => {
                let parent = Self::operand_at(ops, 1, name)?;
                let actual = zobject::relation(mem, obj, Relation::Parent)?;
                self.branch_on(inst, actual == parent)
            }
            "insert_obj" => {
                let dest = Self::operand_at(ops, 1, name)?;
                zobject::move_object(mem, obj, dest)
            }
            "remove_obj" => zobject::move_object(mem, obj, 0),
            "get_parent" => {
                let parent = zobject::relation(mem, obj, Relation::Parent)?;
                self.store_result(inst, parent)
            }
            "get_sibling" => {
                let sibling = zobject::relation(mem, obj, Relation::Sibling)?;
                self.store_result(inst, sibling)?;
                self.branch_on(inst, sibling != 0)
            }
            "get_child" => {
                let child = zobject::relation(mem, obj, Relation::Child)?;
                self.store_result(inst, child)?;
                self.branch_on(inst, child != 0)
            }
            "get_prop" => {
                let prop = Self::operand_at(ops, 1, name)?;
                let value = match zobject::property_value(mem, obj, prop)? {
                    Some(value) => value,
                    None => zobject::default_property(mem, prop)?,
                };
                self.store_result(inst, value)
            }
            "get_prop_addr" => {
                let prop = Self::operand_at(ops, 1, name)?;
                let addr = zobject::property_data_addr_of(mem, obj, prop)?;
                self.store_result(inst, addr)
            }
            "get_prop_len" => {
                // the operand is a data address, not an object
                if obj == 0 {
                    self.store_result(inst, 0)
                } else {
                    let len = zobject::property_len_from_data_addr(mem, obj as usize)?;
                    self.store_result(inst, len)
                }
            }
            "get_next_prop" => {
                let prop = Self::operand_at(ops, 1, name)?;
                let next = if prop == 0 {
                    zobject::first_property_number(mem, obj)?
                } else {
                    zobject::next_property_number(mem, obj, prop)?
                };
                self.store_result(inst, next)
            }
            "put_prop" => {
                let prop = Self::operand_at(ops, 1, name)?;
                let value = Self::operand_at(ops, 2, name)?;
                zobject::set_property(mem, obj, prop, value)
            }
            "print_obj" => {
                let text = zobject::object_name(mem, obj)?;
                self.print(&text);
                Ok(())
            }
            _ => unreachable!(),
        }
    }
}
