//! Shared memory regions and grants
//!
//! A region is a reference-counted range of physical frames owned by one
//! process. The owner hands out per-grantee grants whose permissions are
//! masked against its own; `ref_count` is always 1 (the owner) plus the
//! number of active grants.

use bitflags::bitflags;

use crate::mm::PhysicalAddress;

/// Maximum number of simultaneously active regions.
pub const MAX_SHARED_REGIONS: usize = 64;

/// Maximum active grants per region.
pub const MAX_GRANTS_PER_REGION: usize = 16;

bitflags! {
    /// Shared-region access permissions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SharePerms: u32 {
        const READ  = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC  = 1 << 2;
    }
}

/// A shared memory region.
#[derive(Debug, Clone, Copy)]
pub struct SharedRegion {
    pub id: u32,
    pub owner: u32,
    /// Physical base of the contiguous backing frames
    pub phys_base: PhysicalAddress,
    /// Owner-visible virtual base (identity with the physical base in this
    /// revision; the page-table mapping is the address-space layer's job)
    pub virt_base: u64,
    /// Region size in bytes (frame-rounded)
    pub size: usize,
    /// Owner permissions; grants are masked against these
    pub perms: SharePerms,
    /// 1 (owner) + active grants
    pub ref_count: u32,
    pub active: bool,
}

impl SharedRegion {
    pub const EMPTY: SharedRegion = SharedRegion {
        id: 0,
        owner: 0,
        phys_base: PhysicalAddress::new(0),
        virt_base: 0,
        size: 0,
        perms: SharePerms::empty(),
        ref_count: 0,
        active: false,
    };
}

/// One grant of region access to another process.
#[derive(Debug, Clone, Copy)]
pub struct RegionGrant {
    pub region_id: u32,
    pub grantee: u32,
    /// Address the grantee mapped the region at (0 while unmapped)
    pub mapped_addr: u64,
    /// Granted permissions, a subset of the owner's
    pub perms: SharePerms,
    pub active: bool,
}

impl RegionGrant {
    pub const EMPTY: RegionGrant = RegionGrant {
        region_id: 0,
        grantee: 0,
        mapped_addr: 0,
        perms: SharePerms::empty(),
        active: false,
    };
}
