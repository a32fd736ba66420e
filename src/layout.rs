//! This module contains the static slot layout of a contract's declared
//! storage.
//!
//! # Packing
//!
//! Variables are assigned to slots in declaration order. A variable shares the
//! slot of the previous variable if the free space remaining in that slot is at
//! least its packed size, and in that case it is placed immediately to the
//! left (towards the high-order end) of the bytes already used. Structs and
//! arrays always occupy a full slot and hence always start a new one.

use std::collections::HashMap;

use crate::{
    constant::SLOT_SIZE_BYTES,
    error::{decode, layout, schema, Result},
    schema::{Type, TypeSchema, Variable},
    utility::page_range,
    word::Word,
};

/// A declared variable enriched with its computed position in storage.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Member {
    /// The declared name of the member.
    pub name: String,

    /// The declared type of the member.
    pub ty: Type,

    /// The zero-based position of the member in its declaration list.
    pub position: usize,

    /// Whether the member shares the slot of the member before it.
    pub packed: bool,

    /// The bytes of the member's slot left unused after this member is placed.
    pub slot_free_space: usize,

    /// The index of the slot at which the member starts, relative to the start
    /// of its declaration list.
    pub storage_index: u64,

    /// The number of slots this member adds to its declaration list.
    ///
    /// This is zero for members packed into a previous slot.
    pub reserved_slots: u64,
}

impl Member {
    /// Gets the number of bytes the member occupies within its slot.
    #[must_use]
    pub fn size(&self) -> usize {
        self.ty.packed_size()
    }

    /// Extracts the member's bytes from the `slot` word that contains it.
    #[must_use]
    pub fn extract_value(&self, slot: &Word) -> Word {
        extract_value(slot, self)
    }
}

/// Extracts the bytes of `member` from the `slot` word, right-aligning them in
/// the result.
///
/// The member occupies bytes `[slot_free_space, slot_free_space + size)` of
/// the big-endian slot word.
#[must_use]
pub fn extract_value(slot: &Word, member: &Member) -> Word {
    let from = member.slot_free_space.min(SLOT_SIZE_BYTES);
    let to = (from + member.size()).min(SLOT_SIZE_BYTES);

    Word::from_slice(&slot.as_bytes()[from..to])
}

/// An ordered list of members, as laid out for a contract or a struct.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Members {
    members: Vec<Member>,
}

impl Members {
    /// Lays out `variables` in order, using `slots_of` to compute the number
    /// of slots occupied by values of each unpacked type.
    fn lay_out(
        variables: &[Variable],
        mut slots_of: impl FnMut(&Type) -> Result<u64>,
    ) -> Result<Self> {
        let mut members: Vec<Member> = Vec::with_capacity(variables.len());
        let mut run_head_reserved = 0u64;

        for variable in variables {
            let size = variable.ty.packed_size();
            let (packed, slot_free_space, storage_index) = match members.last() {
                None => (false, SLOT_SIZE_BYTES - size, 0),
                Some(prev) => {
                    let packed = prev.slot_free_space >= size;
                    let available = if packed {
                        prev.slot_free_space
                    } else {
                        SLOT_SIZE_BYTES
                    };
                    let free = available - size;
                    let index = if packed {
                        prev.storage_index
                    } else {
                        prev.storage_index.checked_add(run_head_reserved).ok_or_else(|| {
                            layout::Error::SlotOverflow {
                                name: variable.name.clone(),
                            }
                        })?
                    };
                    (packed, free, index)
                }
            };

            let reserved_slots = match &variable.ty {
                ty @ (Type::Struct(_) | Type::Array { size: Some(_), .. }) => slots_of(ty)?,
                _ => u64::from(!packed),
            };
            if !packed {
                run_head_reserved = reserved_slots;
            }

            members.push(Member {
                name: variable.name.clone(),
                ty: variable.ty.clone(),
                position: variable.position,
                packed,
                slot_free_space,
                storage_index,
                reserved_slots,
            });
        }

        Ok(Self { members })
    }

    /// Gets the members in declaration order.
    #[must_use]
    pub fn all(&self) -> &[Member] {
        &self.members
    }

    /// Gets the zero-based `page` of at most `size` members.
    #[must_use]
    pub fn page(&self, page: usize, size: usize) -> &[Member] {
        &self.members[page_range(page, size, self.members.len())]
    }

    /// Gets the member declared at `position`.
    #[must_use]
    pub fn find_by_position(&self, position: usize) -> Option<&Member> {
        self.members.iter().find(|m| m.position == position)
    }

    /// Gets the total number of slots reserved by the members.
    #[must_use]
    pub fn reserved_slots_count(&self) -> u64 {
        self.members
            .iter()
            .fold(0u64, |acc, m| acc.saturating_add(m.reserved_slots))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The slot layout of a whole contract, with the layouts of all of its structs.
///
/// This is computed once per schema and is immutable afterwards, so it can be
/// shared between any number of concurrent views.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContractLayout {
    schema:        TypeSchema,
    members:       Members,
    struct_fields: HashMap<String, Members>,
}

impl ContractLayout {
    /// Computes the layout for `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the slot arithmetic overflows or if the schema refers
    /// to a struct it does not declare.
    pub fn new(schema: TypeSchema) -> Result<Self> {
        let mut struct_fields = HashMap::new();
        for decl in schema.structs() {
            lay_out_struct(&schema, &decl.name, &mut struct_fields)?;
        }
        let members = Members::lay_out(schema.variables(), |ty| {
            slots_of_type(&schema, ty, &mut struct_fields)
        })?;

        Ok(Self {
            schema,
            members,
            struct_fields,
        })
    }

    /// Parses a schema from its JSON `document` and computes its layout.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the schema is invalid or its layout cannot be
    /// computed.
    pub fn from_json(document: &str) -> Result<Self> {
        Self::new(TypeSchema::from_json(document)?)
    }

    #[must_use]
    pub fn schema(&self) -> &TypeSchema {
        &self.schema
    }

    /// Gets the top-level members of the contract.
    #[must_use]
    pub fn members(&self) -> &Members {
        &self.members
    }

    /// Gets the laid-out fields of the struct called `name`.
    #[must_use]
    pub fn struct_fields(&self, name: &str) -> Option<&Members> {
        self.struct_fields.get(name)
    }

    /// Gets the name of the value at `ordinal` in the enum called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the ordinal is out of range for the enum.
    pub fn enum_value(&self, name: &str, ordinal: usize) -> decode::Result<&str> {
        let values = self.schema.enum_values(name).unwrap_or_default();
        values
            .get(ordinal)
            .map(String::as_str)
            .ok_or_else(|| decode::Error::EnumOrdinalOutOfRange {
                name: name.to_string(),
                ordinal,
                count: values.len(),
            })
    }

    /// Gets the number of slots spanned by one value of type `ty` when stored
    /// as an element of an array.
    ///
    /// Structs span all of their reserved slots and static arrays span all of
    /// their elements, while every other type spans a single slot.
    #[must_use]
    pub fn slots_per_element(&self, ty: &Type) -> u64 {
        match ty {
            Type::Struct(name) => self
                .struct_fields(name)
                .map_or(1, Members::reserved_slots_count),
            Type::Array {
                element,
                size: Some(size),
            } => u64::from(*size).saturating_mul(self.slots_per_element(element)),
            _ => 1,
        }
    }
}

/// Lays out the struct called `name` and everything it embeds, memoizing the
/// results in `done`.
fn lay_out_struct(
    schema: &TypeSchema,
    name: &str,
    done: &mut HashMap<String, Members>,
) -> Result<u64> {
    if let Some(members) = done.get(name) {
        return Ok(members.reserved_slots_count());
    }

    let fields = schema
        .struct_fields(name)
        .ok_or_else(|| schema::Error::UnknownStruct {
            name: name.to_string(),
        })?;
    let members = Members::lay_out(fields, |ty| slots_of_type(schema, ty, done))?;
    let reserved = members.reserved_slots_count();
    done.insert(name.to_string(), members);

    Ok(reserved)
}

fn slots_of_type(
    schema: &TypeSchema,
    ty: &Type,
    done: &mut HashMap<String, Members>,
) -> Result<u64> {
    match ty {
        Type::Struct(name) => lay_out_struct(schema, name, done),
        Type::Array {
            element,
            size: Some(size),
        } => {
            let per_element = match element.as_ref() {
                inner @ (Type::Struct(_) | Type::Array { size: Some(_), .. }) => {
                    slots_of_type(schema, inner, done)?
                }
                _ => 1,
            };
            u64::from(*size)
                .checked_mul(per_element)
                .ok_or_else(|| {
                    layout::Error::SlotOverflow {
                        name: ty.to_string(),
                    }
                    .into()
                })
        }
        _ => Ok(1),
    }
}
