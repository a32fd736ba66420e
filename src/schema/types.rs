//! This module contains the representation of the types that can be declared
//! in a contract's storage, along with the parser for their textual form.
//!
//! # Grammar
//!
//! ```text
//! type       := mapping | array | enum | struct | contract | elementary
//! mapping    := "mapping" "<" type "," type ">"
//! array      := "array" "<" type ">" "[" digits? "]"
//! enum       := "enum" ":" name
//! struct     := "struct" ":" name
//! contract   := "contract" (":" name)?
//! elementary := name
//! ```
//!
//! An array with no size between its brackets is dynamic.

use std::fmt::{Display, Formatter};

use crate::{
    constant::{ADDRESS_SIZE_BYTES, BOOL_SIZE_BYTES, ENUM_SIZE_BYTES, SLOT_SIZE_BYTES},
    error::schema::{Error, Result},
};

/// The elementary (value) types.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Elementary {
    Bool,
    Address,
    String,
    Bytes,

    /// A signed integer of the given width in bits.
    Int(u16),

    /// An unsigned integer of the given width in bits.
    UInt(u16),

    /// Any other elementary type, such as `bytes32`, which is rendered as a raw
    /// word.
    Other(String),
}

impl Elementary {
    /// Interprets the elementary type `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `name` is an integer type with an invalid width.
    pub fn parse(name: &str) -> Result<Self> {
        let elementary = match name {
            "bool" => Self::Bool,
            "address" => Self::Address,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            "int" => Self::Int(256),
            "uint" => Self::UInt(256),
            _ => {
                if let Some(width) = name.strip_prefix("uint") {
                    Self::UInt(Self::parse_width(name, width)?)
                } else if let Some(width) = name.strip_prefix("int") {
                    Self::Int(Self::parse_width(name, width)?)
                } else {
                    Self::Other(name.to_string())
                }
            }
        };

        Ok(elementary)
    }

    fn parse_width(name: &str, width: &str) -> Result<u16> {
        let bits: u16 = width
            .parse()
            .map_err(|_| Error::invalid_expression(name, "integer width is not a number"))?;
        if bits == 0 || bits > 256 || bits % 8 != 0 {
            return Err(Error::invalid_expression(
                name,
                "integer width must be a multiple of 8 between 8 and 256",
            ));
        }

        Ok(bits)
    }

    /// Checks if the type is one of the integer types.
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::UInt(_))
    }
}

impl Display for Elementary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Address => write!(f, "address"),
            Self::String => write!(f, "string"),
            Self::Bytes => write!(f, "bytes"),
            Self::Int(bits) => write!(f, "int{bits}"),
            Self::UInt(bits) => write!(f, "uint{bits}"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// A type that can be declared for a storage variable.
///
/// Struct and enum types are referenced by name, and are resolved against the
/// [`super::TypeSchema`] that declares them.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Type {
    Elementary(Elementary),
    Enum(String),
    Struct(String),

    /// An array of `element`, which is dynamic if `size` is [`None`].
    Array {
        element: Box<Type>,
        size:    Option<u32>,
    },

    Mapping {
        key:   Box<Type>,
        value: Box<Type>,
    },

    /// A reference to a contract, which is stored as its address.
    Contract(Option<String>),
}

impl Type {
    /// Parses a type from its textual `expression`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `expression` does not match the type grammar.
    pub fn parse(expression: &str) -> Result<Self> {
        let mut parser = Parser::new(expression);
        let ty = parser.parse_type()?;
        parser.skip_whitespace();
        if !parser.rest.is_empty() {
            return Err(Error::invalid_expression(
                expression,
                format!("unexpected trailing input {:?}", parser.rest),
            ));
        }

        Ok(ty)
    }

    /// Gets the number of bytes that a value of this type occupies when
    /// packed into a slot.
    #[must_use]
    pub fn packed_size(&self) -> usize {
        match self {
            Self::Elementary(Elementary::Bool) => BOOL_SIZE_BYTES,
            Self::Enum(_) => ENUM_SIZE_BYTES,
            Self::Elementary(Elementary::Address) | Self::Contract(_) => ADDRESS_SIZE_BYTES,
            _ => SLOT_SIZE_BYTES,
        }
    }

    /// Checks if the children of values of this type are only discoverable
    /// through the dictionary.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Array { .. } | Self::Mapping { .. })
    }

    #[must_use]
    pub fn is_struct(&self) -> bool {
        matches!(self, Self::Struct(_))
    }

    #[must_use]
    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping { .. })
    }

    #[must_use]
    pub fn is_static_array(&self) -> bool {
        matches!(self, Self::Array { size: Some(_), .. })
    }

    #[must_use]
    pub fn is_dynamic_array(&self) -> bool {
        matches!(self, Self::Array { size: None, .. })
    }

    /// Gets the name of the struct if this is a struct type.
    #[must_use]
    pub fn struct_name(&self) -> Option<&str> {
        match self {
            Self::Struct(name) => Some(name),
            _ => None,
        }
    }

    /// Gets the short name of the kind of this type, as used in entries.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Elementary(_) => "elementary",
            Self::Enum(_) => "enum",
            Self::Struct(_) => "struct",
            Self::Array { .. } => "array",
            Self::Mapping { .. } => "mapping",
            Self::Contract(_) => "contract",
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Elementary(e) => write!(f, "{e}"),
            Self::Enum(name) => write!(f, "enum:{name}"),
            Self::Struct(name) => write!(f, "struct:{name}"),
            Self::Array {
                element,
                size: Some(size),
            } => write!(f, "array<{element}>[{size}]"),
            Self::Array {
                element,
                size: None,
            } => write!(f, "array<{element}>[]"),
            Self::Mapping { key, value } => write!(f, "mapping<{key},{value}>"),
            Self::Contract(Some(name)) => write!(f, "contract:{name}"),
            Self::Contract(None) => write!(f, "contract"),
        }
    }
}

/// A recursive descent parser over a type expression.
struct Parser<'a> {
    expression: &'a str,
    rest:       &'a str,
}

impl<'a> Parser<'a> {
    fn new(expression: &'a str) -> Self {
        Self {
            expression,
            rest: expression,
        }
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::invalid_expression(self.expression, reason)
    }

    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn expect(&mut self, token: char) -> Result<()> {
        self.skip_whitespace();
        match self.rest.strip_prefix(token) {
            Some(rest) => {
                self.rest = rest;
                Ok(())
            }
            None => Err(self.error(format!("expected {token:?} at {:?}", self.rest))),
        }
    }

    fn accept(&mut self, token: char) -> bool {
        self.skip_whitespace();
        match self.rest.strip_prefix(token) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn name(&mut self) -> Result<&'a str> {
        self.skip_whitespace();
        let end = self
            .rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.')))
            .unwrap_or(self.rest.len());
        if end == 0 {
            return Err(self.error(format!("expected a name at {:?}", self.rest)));
        }
        let (name, rest) = self.rest.split_at(end);
        self.rest = rest;

        Ok(name)
    }

    fn parse_type(&mut self) -> Result<Type> {
        let ty = match self.name()? {
            "mapping" => {
                self.expect('<')?;
                let key = self.parse_type()?;
                self.expect(',')?;
                let value = self.parse_type()?;
                self.expect('>')?;
                Type::Mapping {
                    key:   Box::new(key),
                    value: Box::new(value),
                }
            }
            "array" => {
                self.expect('<')?;
                let element = self.parse_type()?;
                self.expect('>')?;
                self.expect('[')?;
                self.skip_whitespace();
                let digits_end = self
                    .rest
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(self.rest.len());
                let (digits, rest) = self.rest.split_at(digits_end);
                self.rest = rest;
                let size = if digits.is_empty() {
                    None
                } else {
                    let size: u32 = digits
                        .parse()
                        .map_err(|_| self.error(format!("array size {digits:?} is too large")))?;
                    Some(size)
                };
                self.expect(']')?;
                Type::Array {
                    element: Box::new(element),
                    size,
                }
            }
            "enum" => {
                self.expect(':')?;
                Type::Enum(self.name()?.to_string())
            }
            "struct" => {
                self.expect(':')?;
                Type::Struct(self.name()?.to_string())
            }
            "contract" => {
                if self.accept(':') {
                    Type::Contract(Some(self.name()?.to_string()))
                } else {
                    Type::Contract(None)
                }
            }
            name => Type::Elementary(Elementary::parse(name)?),
        };

        Ok(ty)
    }
}
