//! This module contains the typed view over a contract's storage, which
//! combines the slot layout of its schema with a dictionary of resolved
//! locations and a reader over its raw slots.
//!
//! # Elements
//!
//! The view is a tree of [`Element`]s addressed by [`Path`]s. The root is the
//! contract itself, whose children are its top-level members addressed by
//! their declaration position. Struct fields are likewise addressed by
//! position, array elements by their index, and mapping values by the key
//! under which the dictionary recorded them.
//!
//! Elements are computed on demand and never persisted. Their children and
//! values are derived from the dictionary each time they are asked for, so a
//! location that was never recorded simply has no children and reads as zero.

pub mod decode;
pub mod location;

use std::collections::BTreeSet;

use derivative::Derivative;
use tracing::trace;

use crate::{
    dictionary::{
        element::PathElementKind,
        path::{parse_index, Path},
        NodeRef,
        StorageDictionary,
    },
    entry::{EntryKey, EntryValue, StorageEntry},
    error::{layout, Result},
    layout::{ContractLayout, Member, Members},
    schema::Type,
    utility::page_range,
    view::{
        decode::{decode_scalar, render_map_key},
        location::Location,
    },
    word::Word,
};

/// A single node in the typed view.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Element {
    /// The last segment of the element's path, which is empty for the root.
    pub id: String,

    /// The logical path from the root to this element.
    pub path: Path,

    /// The declared type of the element, which is [`None`] for the root.
    pub ty: Option<Type>,

    /// The declaration of the element, if it is a top-level member or a
    /// struct field.
    pub member: Option<Member>,

    /// The declared type of the element's parent, which is [`None`] for the
    /// root and for top-level members.
    pub parent_ty: Option<Type>,

    /// The location of the element's first slot, which is [`None`] for the
    /// root.
    pub location: Option<Location>,
}

impl Element {
    /// Constructs the root element, standing for the whole contract.
    #[must_use]
    pub fn root() -> Self {
        Self {
            id:        String::new(),
            path:      Path::root(),
            ty:        None,
            member:    None,
            parent_ty: None,
            location:  None,
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Checks if the element has a value of its own rather than children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(
            self.ty,
            Some(Type::Elementary(_) | Type::Enum(_) | Type::Contract(_))
        )
    }
}

/// The typed view over the storage of a single contract.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct StorageView<'a> {
    layout:     &'a ContractLayout,
    dictionary: &'a StorageDictionary,

    /// Reads the raw slot at a key, if it exists.
    #[derivative(Debug = "ignore")]
    reader: Box<dyn Fn(&Word) -> Option<Word> + 'a>,
}

impl<'a> StorageView<'a> {
    /// Constructs a view over the contract with the provided `layout`, whose
    /// resolved locations are in `dictionary` and whose slots are read using
    /// `reader`.
    pub fn new(
        layout: &'a ContractLayout,
        dictionary: &'a StorageDictionary,
        reader: impl Fn(&Word) -> Option<Word> + 'a,
    ) -> Self {
        Self {
            layout,
            dictionary,
            reader: Box::new(reader),
        }
    }

    #[must_use]
    pub fn layout(&self) -> &'a ContractLayout {
        self.layout
    }

    #[must_use]
    pub fn dictionary(&self) -> &'a StorageDictionary {
        self.dictionary
    }

    /// Gets the element addressed by `path`, descending from the root.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if a segment does not name a child of the element
    /// reached before it.
    pub fn element_by_path(&self, path: &Path) -> Result<Element> {
        path.segments()
            .iter()
            .try_fold(Element::root(), |element, segment| {
                self.child_of(&element, segment)
            })
    }

    /// Gets the child of `parent` named by `segment`.
    ///
    /// The child need not exist in the dictionary, in which case it will have
    /// no children and read as zero.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `parent` has no nested types, or if `segment` is not
    /// a valid child name for it.
    pub fn child_of(&self, parent: &Element, segment: &str) -> Result<Element> {
        let path = parent.path.extend(segment)?;
        let no_such_child = || layout::Error::NoSuchChild {
            path:    parent.path.to_string(),
            segment: segment.to_string(),
        };

        let Some((parent_ty, parent_location)) = parent.ty.as_ref().zip(parent.location.as_ref())
        else {
            let member = self
                .layout
                .members()
                .find_by_position(to_position(parse_index(segment)?))
                .ok_or_else(no_such_child)?;
            return Ok(Element {
                id: segment.to_string(),
                path,
                ty: Some(member.ty.clone()),
                member: Some(member.clone()),
                parent_ty: None,
                location: Some(Location::root(member.storage_index)),
            });
        };

        let (ty, member, location) = match parent_ty {
            Type::Struct(name) => {
                let position = to_position(parse_index(segment)?);
                let field = self
                    .layout
                    .struct_fields(name)
                    .and_then(|fields| fields.find_by_position(position))
                    .ok_or_else(|| layout::Error::NoSuchField {
                        container: name.clone(),
                        position,
                    })?;
                let location = parent_location.shifted(field.storage_index, &field.name)?;
                (field.ty.clone(), Some(field.clone()), location)
            }
            Type::Array {
                element,
                size: Some(size),
            } => {
                let index = parse_index(segment)?;
                if index >= u64::from(*size) {
                    return Err(no_such_child().into());
                }
                let offset = self.element_offset(element, index, &path)?;
                let location = parent_location.shifted(offset, &path.to_string())?;
                (element.as_ref().clone(), None, location)
            }
            Type::Array {
                element,
                size: None,
            } => {
                let index = parse_index(segment)?;
                let offset = self.element_offset(element, index, &path)?;
                let location = Location::array_data(parent_location.dictionary_path(), offset);
                (element.as_ref().clone(), None, location)
            }
            Type::Mapping { value, .. } => {
                let mut entry = parent_location.dictionary_path();
                entry.push(segment.to_string());
                (value.as_ref().clone(), None, Location::map_value(entry))
            }
            other => {
                return Err(layout::Error::NoNestedTypes {
                    path:      parent.path.to_string(),
                    type_name: other.to_string(),
                }
                .into())
            }
        };

        Ok(Element {
            id: segment.to_string(),
            path,
            ty: Some(ty),
            member,
            parent_ty: Some(parent_ty.clone()),
            location: Some(location),
        })
    }

    /// Gets the ids of all children of `element`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the slot arithmetic for the element overflows.
    pub fn children_ids(&self, element: &Element) -> Result<Vec<String>> {
        let positions = |members: Option<&Members>| {
            members
                .map(|m| m.all().iter().map(|f| f.position.to_string()).collect())
                .unwrap_or_default()
        };

        let (Some(ty), Some(location)) = (&element.ty, &element.location) else {
            return Ok(positions(Some(self.layout.members())));
        };

        let ids = match ty {
            Type::Struct(name) => positions(self.layout.struct_fields(name)),
            Type::Array {
                element: inner,
                size: Some(size),
            } => {
                let count = self.static_array_len(element, inner, *size, location)?;
                (0..count).map(|i| i.to_string()).collect()
            }
            Type::Array {
                element: inner,
                size: None,
            } => {
                let slots = self.layout.slots_per_element(inner).max(1);
                let indices = self
                    .node(element)
                    .map(|node| {
                        node.children_iter()
                            .filter(|c| c.kind() == Some(PathElementKind::ArrayIndex))
                            .filter_map(|c| c.key().parse::<u64>().ok())
                            .map(|offset| offset / slots)
                            .collect::<BTreeSet<_>>()
                    })
                    .unwrap_or_default();
                indices.into_iter().map(|i| i.to_string()).collect()
            }
            Type::Mapping { .. } => self
                .node(element)
                .map(|node| {
                    node.children_iter()
                        .filter(|c| c.kind() == Some(PathElementKind::MapKey))
                        .map(|c| c.key().to_string())
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        Ok(ids)
    }

    /// Gets the number of children of `element`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the slot arithmetic for the element overflows.
    pub fn children_count(&self, element: &Element) -> Result<usize> {
        Ok(self.children_ids(element)?.len())
    }

    /// Gets the zero-based `page` of at most `size` children of `element`,
    /// along with the total number of children across all pages.
    ///
    /// With `ignore_empty` set, children with nothing recorded in the
    /// dictionary are skipped before paging.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if a child cannot be constructed.
    pub fn children(
        &self,
        element: &Element,
        page: usize,
        size: usize,
        ignore_empty: bool,
    ) -> Result<(Vec<Element>, usize)> {
        let ids = self.children_ids(element)?;

        if ignore_empty {
            let mut present = Vec::new();
            for id in &ids {
                let child = self.child_of(element, id)?;
                if self.is_present(&child)? {
                    present.push(child);
                }
            }
            let total = present.len();
            let range = page_range(page, size, total);
            return Ok((present.drain(range).collect(), total));
        }

        let total = ids.len();
        let children = ids[page_range(page, size, total)]
            .iter()
            .map(|id| self.child_of(element, id))
            .collect::<Result<Vec<_>>>()?;

        Ok((children, total))
    }

    /// Checks if anything was recorded in the dictionary for `element`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the children of the element cannot be constructed.
    pub fn is_present(&self, element: &Element) -> Result<bool> {
        match &element.ty {
            None => Ok(true),
            Some(Type::Struct(_)) => {
                for id in self.children_ids(element)? {
                    if self.is_present(&self.child_of(element, &id)?)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Some(Type::Array { size: Some(_), .. }) => Ok(self.children_count(element)? > 0),
            Some(_) => Ok(self.node(element).is_some()),
        }
    }

    /// Gets the dictionary node addressing the first slot of `element`.
    #[must_use]
    pub fn node(&self, element: &Element) -> Option<NodeRef<'a>> {
        match &element.location {
            None => Some(self.dictionary.root()),
            Some(location) => self.dictionary.get_by_path(&location.dictionary_path()),
        }
    }

    /// Gets the display name of `element`.
    ///
    /// Members are named by their declaration and mapping values by their key
    /// rendered according to the mapping's key type.
    #[must_use]
    pub fn key(&self, element: &Element) -> String {
        if let Some(member) = &element.member {
            return member.name.clone();
        }
        match &element.parent_ty {
            Some(Type::Mapping { key, .. }) => render_map_key(self.layout, key, &element.id),
            _ => element.id.clone(),
        }
    }

    /// Reads the raw value of the leaf `element`, isolated from any other
    /// values packed into its slot.
    #[must_use]
    pub fn storage_value(&self, element: &Element) -> Option<Word> {
        if !element.is_leaf() {
            return None;
        }
        let slot = self.read(self.node(element)?)?;

        Some(match &element.member {
            Some(member) => member.extract_value(&slot),
            None => slot,
        })
    }

    /// Decodes the value of the leaf `element`, returning [`None`] for
    /// containers.
    #[must_use]
    pub fn value(&self, element: &Element) -> Option<String> {
        let ty = element.ty.as_ref()?;
        let raw = self.storage_value(element);

        decode_scalar(self.layout, ty, raw, || self.value_bytes(element, raw))
    }

    /// Constructs the decoded entry for `element`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the children of the element cannot be counted.
    pub fn entry(&self, element: &Element) -> Result<StorageEntry> {
        let name = self.key(element);
        let role = match &element.parent_ty {
            None => "data member".to_string(),
            Some(Type::Struct(_)) => "field".to_string(),
            Some(Type::Mapping { key, .. }) => key.to_string(),
            Some(_) => "index".to_string(),
        };
        let raw_key = (element.id != name).then(|| element.id.clone());

        let key = EntryKey {
            raw: raw_key,
            name,
            path: element.path.to_string(),
            kind: role,
            decoded: true,
        };

        let value = EntryValue {
            value:     self.value(element),
            raw:       self.storage_value(element).map(|w| w.to_hex()),
            type_name: element.ty.as_ref().map(ToString::to_string).unwrap_or_default(),
            kind:      element.ty.as_ref().map(|t| t.kind_name().to_string()),
            container: !element.is_leaf(),
            size:      self.children_count(element)?,
            decoded:   true,
        };

        Ok(StorageEntry { key, value })
    }

    fn read(&self, node: NodeRef<'_>) -> Option<Word> {
        node.storage_key().and_then(|key| (self.reader)(&key))
    }

    /// Assembles the bytes of a dynamically-sized value, which live in the
    /// array data under its node when the value is too long for a single slot.
    fn value_bytes(&self, element: &Element, raw: Option<Word>) -> Vec<u8> {
        let Some(node) = self.node(element) else {
            return Vec::new();
        };

        let mut data = node
            .children_iter()
            .filter(|c| c.kind() == Some(PathElementKind::ArrayIndex))
            .filter_map(|c| c.key().parse::<u64>().ok().map(|ix| (ix, c)))
            .collect::<Vec<_>>();
        data.sort_by_key(|(ix, _)| *ix);

        let bytes = data
            .into_iter()
            .filter_map(|(_, child)| self.read(child))
            .flat_map(|word| *word.as_bytes())
            .collect::<Vec<_>>();
        if bytes.is_empty() {
            raw.map(|w| w.as_bytes().to_vec()).unwrap_or_default()
        } else {
            bytes
        }
    }

    /// Gets the slot offset of the element at `index` in an array of
    /// `element` values.
    fn element_offset(&self, element: &Type, index: u64, path: &Path) -> layout::Result<u64> {
        index
            .checked_mul(self.layout.slots_per_element(element))
            .ok_or_else(|| layout::Error::SlotOverflow {
                name: path.to_string(),
            })
    }

    /// Counts the elements of a static array.
    ///
    /// Arrays laid out from the root of storage or declared as a member are
    /// probed element by element until the first one missing from the
    /// dictionary. Other arrays at hashed bases estimate the count from the
    /// number of slots recorded under their base.
    fn static_array_len(
        &self,
        array: &Element,
        inner: &Type,
        size: u32,
        location: &Location,
    ) -> Result<u64> {
        let slots = self.layout.slots_per_element(inner).max(1);

        if array.member.is_none() && location.is_hashed() {
            let children = self
                .dictionary
                .get_by_path(location.base_path())
                .map_or(0, |n| u64::try_from(n.children_count()).unwrap_or(u64::MAX));
            let estimate = (children / slots).min(u64::from(size));
            trace!(path = %array.path, children, estimate, "Estimated static array length");
            return Ok(estimate);
        }

        let mut count = 0;
        for index in 0..u64::from(size) {
            let offset = self.element_offset(inner, index, &array.path)?;
            let start = location.shifted(offset, &array.path.to_string())?;
            if self.dictionary.get_by_path(&start.dictionary_path()).is_none() {
                break;
            }
            count += 1;
        }

        Ok(count)
    }
}

/// Converts a parsed index into a declaration position.
fn to_position(index: u64) -> usize {
    usize::try_from(index).unwrap_or(usize::MAX)
}
