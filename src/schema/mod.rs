//! This module contains the type schema that describes the declared storage of
//! a single contract.
//!
//! A schema is parsed from a JSON document of the following shape, where every
//! `type` is an expression in the grammar described in [`types`].
//!
//! ```json
//! {
//!   "name": "Token",
//!   "variables": [{ "name": "owner", "type": "address" }],
//!   "structs": [{ "name": "Entry", "fields": [{ "name": "id", "type": "uint256" }] }],
//!   "enums": [{ "name": "State", "values": ["Open", "Closed"] }]
//! }
//! ```
//!
//! Every struct and enum reference is resolved when the schema is built, so a
//! successfully built schema can be traversed without further validation.

pub mod types;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::schema::{Error, Result};
pub use types::{Elementary, Type};

/// A declared variable, either a top-level contract variable or a struct
/// field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Variable {
    /// The declared name of the variable.
    pub name: String,

    /// The declared type of the variable.
    pub ty: Type,

    /// The zero-based position of the variable in its declaration list.
    pub position: usize,
}

/// A struct declaration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StructDecl {
    pub name:   String,
    pub fields: Vec<Variable>,
}

/// The parsed and validated schema of a contract's storage.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TypeSchema {
    name:      String,
    variables: Vec<Variable>,
    structs:   Vec<StructDecl>,
    enums:     HashMap<String, Vec<String>>,
}

impl TypeSchema {
    /// Parses and validates a schema from its JSON `document`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the document is malformed, if any type expression
    /// fails to parse, or if the schema references undeclared or recursive
    /// types.
    pub fn from_json(document: &str) -> Result<Self> {
        let document: SchemaDocument = serde_json::from_str(document)?;
        Self::from_document(document)
    }

    /// Builds and validates a schema from an already parsed `document`.
    ///
    /// # Errors
    ///
    /// See [`Self::from_json`].
    pub fn from_document(document: SchemaDocument) -> Result<Self> {
        let variables = Self::parse_variables(document.variables)?;
        let structs = document
            .structs
            .into_iter()
            .map(|s| {
                Ok(StructDecl {
                    name:   s.name,
                    fields: Self::parse_variables(s.fields)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let enums = document
            .enums
            .into_iter()
            .map(|e| (e.name, e.values))
            .collect::<HashMap<_, _>>();

        let schema = Self {
            name: document.name,
            variables,
            structs,
            enums,
        };
        schema.validate()?;

        Ok(schema)
    }

    fn parse_variables(variables: Vec<VariableDocument>) -> Result<Vec<Variable>> {
        variables
            .into_iter()
            .enumerate()
            .map(|(position, v)| {
                Ok(Variable {
                    name: v.name,
                    ty: Type::parse(&v.ty)?,
                    position,
                })
            })
            .collect()
    }

    /// Gets the name of the contract.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the top-level variables in declaration order.
    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Gets the struct declarations in declaration order.
    #[must_use]
    pub fn structs(&self) -> &[StructDecl] {
        &self.structs
    }

    /// Gets the fields of the struct called `name`, if it exists.
    #[must_use]
    pub fn struct_fields(&self, name: &str) -> Option<&[Variable]> {
        self.structs
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.fields.as_slice())
    }

    /// Gets the values of the enum called `name`, if it exists.
    #[must_use]
    pub fn enum_values(&self, name: &str) -> Option<&[String]> {
        self.enums.get(name).map(Vec::as_slice)
    }

    fn validate(&self) -> Result<()> {
        for (name, values) in &self.enums {
            if values.is_empty() {
                return Err(Error::EmptyEnum { name: name.clone() });
            }
        }

        let all_types = self
            .variables
            .iter()
            .chain(self.structs.iter().flat_map(|s| s.fields.iter()))
            .map(|v| &v.ty);
        for ty in all_types {
            self.validate_references(ty)?;
        }

        let mut done = HashSet::new();
        for decl in &self.structs {
            self.check_recursion(&decl.name, &mut Vec::new(), &mut done)?;
        }

        Ok(())
    }

    fn validate_references(&self, ty: &Type) -> Result<()> {
        match ty {
            Type::Struct(name) if self.struct_fields(name).is_none() => {
                Err(Error::UnknownStruct { name: name.clone() })
            }
            Type::Enum(name) if !self.enums.contains_key(name) => {
                Err(Error::UnknownEnum { name: name.clone() })
            }
            Type::Array { element, .. } => self.validate_references(element),
            Type::Mapping { key, value } => {
                self.validate_references(key)?;
                self.validate_references(value)
            }
            _ => Ok(()),
        }
    }

    /// Checks that the struct `name` does not contain itself inline.
    ///
    /// Containment through a mapping or a dynamic array lives at a hashed
    /// location and is allowed.
    fn check_recursion<'a>(
        &'a self,
        name: &'a str,
        stack: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if stack.contains(&name) {
            return Err(Error::RecursiveStruct {
                name: name.to_string(),
            });
        }

        stack.push(name);
        for field in self.struct_fields(name).unwrap_or_default() {
            if let Some(inner) = inline_struct(&field.ty) {
                self.check_recursion(inner, stack, done)?;
            }
        }
        stack.pop();
        done.insert(name);

        Ok(())
    }
}

/// Gets the struct that `ty` embeds inline, looking through static arrays.
fn inline_struct(ty: &Type) -> Option<&str> {
    match ty {
        Type::Struct(name) => Some(name),
        Type::Array {
            element,
            size: Some(_),
        } => inline_struct(element),
        _ => None,
    }
}

/// The serialized form of a schema.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub name:      String,
    #[serde(default)]
    pub variables: Vec<VariableDocument>,
    #[serde(default)]
    pub structs:   Vec<StructDocument>,
    #[serde(default)]
    pub enums:     Vec<EnumDocument>,
}

/// The serialized form of a variable or struct field.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct VariableDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub ty:   String,
}

/// The serialized form of a struct declaration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StructDocument {
    pub name:   String,
    #[serde(default)]
    pub fields: Vec<VariableDocument>,
}

/// The serialized form of an enum declaration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EnumDocument {
    pub name:   String,
    #[serde(default)]
    pub values: Vec<String>,
}
