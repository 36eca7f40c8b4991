use std::fmt::{Display, Formatter};

use crate::core::traits::AsRaw;
use crate::descriptor::DescriptorPoolType;

/// An opaque handle to one descriptor slot in device memory. This is a reference to the descriptor, it does not
/// own any memory itself.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Descriptor(u64);

const_assert_eq!(std::mem::size_of::<Descriptor>(), 8);

impl Descriptor {
    /// The null descriptor. Unassigned slots of a table hold this value.
    pub const NULL: Descriptor = Descriptor(0);

    /// Wrap a raw descriptor handle.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Whether this is the null descriptor.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Address of the descriptor `count` slots further, given the slot stride.
    pub fn offset(&self, count: u32, stride: u32) -> Self {
        Self(self.0 + count as u64 * stride as u64)
    }
}

impl AsRaw for Descriptor {
    fn as_raw(&self) -> u64 {
        self.0
    }
}

impl Display for Descriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A realized descriptor table: a contiguous range of slots inside one generation of a descriptor pool.
///
/// Tables are plain values. A table stays valid until the pool generation it was issued from is replaced,
/// after which it should be fetched again from the cache. Use
/// [`DescriptorTableCache::validate_table`](crate::DescriptorTableCache::validate_table) to check this.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorTable {
    pub(crate) ty: DescriptorPoolType,
    pub(crate) pool_index: u8,
    pub(crate) generation: u64,
    pub(crate) offset: u32,
    pub(crate) len: u32,
    pub(crate) stride: u32,
    pub(crate) handle: Descriptor,
}

impl DescriptorTable {
    /// Address of the first slot of the table. This is what gets bound to the pipeline.
    pub fn handle(&self) -> Descriptor {
        self.handle
    }

    /// Kind of pool this table lives in.
    pub fn pool_type(&self) -> DescriptorPoolType {
        self.ty
    }

    /// Index of the pool this table lives in.
    pub fn pool_index(&self) -> u8 {
        self.pool_index
    }

    /// Generation of the pool this table was issued from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// First slot of the table inside its pool.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Number of slots in the table.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether the table has no slots. Tables handed out by the cache are never empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Address of slot `index` of this table, or `None` if it is out of range.
    pub fn descriptor(&self, index: u32) -> Option<Descriptor> {
        (index < self.len).then(|| self.handle.offset(index, self.stride))
    }
}

/// A set of render target descriptors together with an optional depth/stencil descriptor.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Framebuffer {
    pub(crate) render_targets: Option<DescriptorTable>,
    pub(crate) depth_stencil: Option<Descriptor>,
}

impl Framebuffer {
    /// Table holding the render target descriptors, if there are any.
    pub fn render_targets(&self) -> Option<&DescriptorTable> {
        self.render_targets.as_ref()
    }

    /// Depth/stencil descriptor, if there is one.
    pub fn depth_stencil(&self) -> Option<Descriptor> {
        self.depth_stencil
    }

    /// Number of bound render targets.
    pub fn num_render_targets(&self) -> u32 {
        self.render_targets.map(|table| table.len).unwrap_or_default()
    }
}
