//! # Dispatch Registry
//!
//! Maps `(category, subtype)` to a decoder for the payload bytes. Subtypes
//! below [`DENSE_SUBTYPES`] index a table that grows on registration; higher
//! ones are hashed. An empty slot resolves to `None`, which is an expected
//! outcome for message types nobody asked to decode.
//!
//! ## Example
//!
//! ```rust
//! use demoscope_protocol::{DecodeError, Message, MessageRegistry, PacketCategory};
//!
//! #[derive(Debug)]
//! struct Tick(u8);
//!
//! impl Message for Tick {
//!     fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
//!         bytes.first().copied().map(Tick).ok_or(DecodeError::Truncated { needed: 1, available: 0 })
//!     }
//! }
//!
//! let mut registry = MessageRegistry::new();
//! registry.register::<Tick>(PacketCategory::Net, 4);
//!
//! let decoded = registry.resolve(PacketCategory::Net, 4, &[9]).unwrap().unwrap();
//! assert_eq!(decoded.downcast_ref::<Tick>().map(|t| t.0), Some(9));
//! assert!(registry.resolve(PacketCategory::Net, 5, &[9]).unwrap().is_none());
//! ```

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;

use crate::error::{DecodeError, DecodeResult};
use crate::variant::FormatVariant;

/// Message families a registry keeps apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PacketCategory {
    /// Top-level demo commands.
    Demo = 0,
    /// Network messages nested in wrapper packets.
    Net = 1,
    /// User messages.
    User = 2,
}

impl PacketCategory {
    /// Number of categories.
    pub const COUNT: usize = 3;

    /// Every category, by index.
    pub const ALL: [Self; Self::COUNT] = [Self::Demo, Self::Net, Self::User];

    /// Storage index of this category.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Looks up a category by index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// A payload kind that can be built from raw bytes.
pub trait Message: Any + Send + Sync + fmt::Debug {
    /// Parses a message from its payload bytes.
    ///
    /// # Errors
    ///
    /// [`DecodeError`] if the bytes are not a valid message of this kind.
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError>
    where
        Self: Sized;
}

/// Payload kept verbatim. Registered by default for every known demo
/// command so each one resolves to something.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpaqueMessage {
    /// The payload bytes.
    pub bytes: Vec<u8>,
}

impl Message for OpaqueMessage {
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }
}

type BoxedMessage = Box<dyn Any + Send + Sync>;
type Factory = fn(&[u8]) -> DecodeResult<BoxedMessage>;

fn decode_boxed<K: Message>(bytes: &[u8]) -> DecodeResult<BoxedMessage> {
    K::decode(bytes).map(|message| Box::new(message) as BoxedMessage)
}

#[derive(Clone, Copy)]
struct Entry {
    type_name: &'static str,
    factory: Factory,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// A decoded payload together with where it was dispatched from.
pub struct DecodedMessage {
    category: PacketCategory,
    subtype: u32,
    type_name: &'static str,
    inner: BoxedMessage,
}

impl DecodedMessage {
    /// Category the message was resolved in.
    #[must_use]
    pub const fn category(&self) -> PacketCategory {
        self.category
    }

    /// Subtype the message was resolved under.
    #[must_use]
    pub const fn subtype(&self) -> u32 {
        self.subtype
    }

    /// Rust type name of the decoded kind.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the message is a `T`.
    #[must_use]
    pub fn is<T: Message>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Borrows the message as a `T`.
    #[must_use]
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Takes the message as a `T`, or gives `self` back.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged when the message is not a `T`.
    pub fn downcast<T: Message>(self) -> Result<Box<T>, Self> {
        if self.is::<T>() {
            self.inner.downcast().map_err(|inner| Self { inner, ..self })
        } else {
            Err(self)
        }
    }
}

impl fmt::Debug for DecodedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedMessage")
            .field("category", &self.category)
            .field("subtype", &self.subtype)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Subtypes below this are stored in a directly indexed table.
pub const DENSE_SUBTYPES: usize = 4096;

/// Decoder table for one format variant.
#[derive(Clone, Debug, Default)]
pub struct MessageRegistry {
    slots: [Vec<Option<Entry>>; PacketCategory::COUNT],
    sparse: [HashMap<u32, Entry>; PacketCategory::COUNT],
}

impl MessageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the default table for `variant`: every known demo command
    /// decodes to an [`OpaqueMessage`].
    #[must_use]
    pub fn for_variant(variant: FormatVariant) -> Self {
        let mut registry = Self::new();
        registry.reserve(PacketCategory::Demo, variant.commands().len());
        for &command in variant.commands() {
            registry.register::<OpaqueMessage>(PacketCategory::Demo, command as u32);
        }
        registry
    }

    /// Pre-sizes a category to hold subtypes below `len`, up to
    /// [`DENSE_SUBTYPES`].
    pub fn reserve(&mut self, category: PacketCategory, len: usize) {
        let len = len.min(DENSE_SUBTYPES);
        let slots = &mut self.slots[category.index()];
        if slots.len() < len {
            slots.resize(len, None);
        }
    }

    /// Installs `K` as the decoder for `(category, subtype)`, replacing any
    /// previous registration.
    pub fn register<K: Message>(&mut self, category: PacketCategory, subtype: u32) {
        let entry = Entry {
            type_name: type_name::<K>(),
            factory: decode_boxed::<K>,
        };
        match dense_index(subtype) {
            Some(index) => {
                self.reserve(category, index + 1);
                self.slots[category.index()][index] = Some(entry);
            }
            None => {
                self.sparse[category.index()].insert(subtype, entry);
            }
        }
    }

    /// Clears `(category, subtype)`. Returns whether it was registered.
    pub fn unregister(&mut self, category: PacketCategory, subtype: u32) -> bool {
        match dense_index(subtype) {
            Some(index) => self.slots[category.index()]
                .get_mut(index)
                .and_then(Option::take)
                .is_some(),
            None => self.sparse[category.index()].remove(&subtype).is_some(),
        }
    }

    /// Whether a decoder is installed for `(category, subtype)`.
    #[must_use]
    pub fn is_registered(&self, category: PacketCategory, subtype: u32) -> bool {
        self.entry(category, subtype).is_some()
    }

    /// Type name registered for `(category, subtype)`.
    #[must_use]
    pub fn registered_name(&self, category: PacketCategory, subtype: u32) -> Option<&'static str> {
        self.entry(category, subtype).map(|entry| entry.type_name)
    }

    /// Number of populated slots in `category`.
    #[must_use]
    pub fn registered_count(&self, category: PacketCategory) -> usize {
        let index = category.index();
        self.slots[index].iter().flatten().count() + self.sparse[index].len()
    }

    /// Decodes `data` with the decoder for `(category, subtype)`.
    ///
    /// Returns `Ok(None)` when nothing is registered.
    ///
    /// # Errors
    ///
    /// The registered decoder's [`DecodeError`].
    pub fn resolve(
        &self,
        category: PacketCategory,
        subtype: u32,
        data: &[u8],
    ) -> DecodeResult<Option<DecodedMessage>> {
        let Some(entry) = self.entry(category, subtype) else {
            return Ok(None);
        };

        let inner = (entry.factory)(data)?;
        Ok(Some(DecodedMessage {
            category,
            subtype,
            type_name: entry.type_name,
            inner,
        }))
    }

    fn entry(&self, category: PacketCategory, subtype: u32) -> Option<&Entry> {
        match dense_index(subtype) {
            Some(index) => self.slots[category.index()].get(index)?.as_ref(),
            None => self.sparse[category.index()].get(&subtype),
        }
    }
}

#[inline]
fn dense_index(subtype: u32) -> Option<usize> {
    usize::try_from(subtype)
        .ok()
        .filter(|&index| index < DENSE_SUBTYPES)
}

/// One decoder table per format variant.
///
/// Shared between containers behind an `Arc`; a container picks the table
/// matching the variant its header declares.
#[derive(Clone, Debug, Default)]
pub struct Registries {
    variant_a: MessageRegistry,
    variant_b: MessageRegistry,
}

impl Registries {
    /// Creates empty tables for both variants.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the default tables for both variants.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            variant_a: MessageRegistry::for_variant(FormatVariant::A),
            variant_b: MessageRegistry::for_variant(FormatVariant::B),
        }
    }

    /// Table for `variant`.
    #[must_use]
    pub const fn get(&self, variant: FormatVariant) -> &MessageRegistry {
        match variant {
            FormatVariant::A => &self.variant_a,
            FormatVariant::B => &self.variant_b,
        }
    }

    /// Mutable table for `variant`.
    pub fn get_mut(&mut self, variant: FormatVariant) -> &mut MessageRegistry {
        match variant {
            FormatVariant::A => &mut self.variant_a,
            FormatVariant::B => &mut self.variant_b,
        }
    }
}
