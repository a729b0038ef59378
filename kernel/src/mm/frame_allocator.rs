//! Physical frame allocator
//!
//! Fixed-capacity bitmap over 4 KiB frames. A set bit means the frame is
//! in use. Allocation scans ascending and takes the first clear bit, so
//! allocation order is deterministic; frames are fixed-size and never
//! coalesced. Shared-memory regions need physically contiguous backing, so
//! a first-fit contiguous allocation is provided as well.

use super::{MemError, PhysicalAddress, FRAME_SIZE};

/// Maximum number of frames the bitmap can track (512 MiB of RAM).
pub const MAX_FRAMES: usize = 131_072;

const BITMAP_WORDS: usize = MAX_FRAMES / 64;

/// Bitmap frame allocator.
pub struct FrameAllocator {
    bitmap: [u64; BITMAP_WORDS],
    total_frames: usize,
    free_frames: usize,
}

impl FrameAllocator {
    /// Create an empty allocator. Unusable until [`init`](Self::init) runs.
    pub const fn new() -> Self {
        Self {
            bitmap: [0; BITMAP_WORDS],
            total_frames: 0,
            free_frames: 0,
        }
    }

    /// Size the allocator for `total_memory` bytes of physical memory.
    /// All frames start free; the caller marks the kernel image and
    /// allocator metadata used afterwards.
    pub fn init(&mut self, total_memory: u64) {
        let frames = (total_memory as usize / FRAME_SIZE).min(MAX_FRAMES);
        self.bitmap = [0; BITMAP_WORDS];
        self.total_frames = frames;
        self.free_frames = frames;

        // Frames past the end of physical memory are permanently used.
        for frame in frames..MAX_FRAMES {
            self.bitmap[frame / 64] |= 1 << (frame % 64);
        }
    }

    fn is_used(&self, frame: usize) -> bool {
        self.bitmap[frame / 64] & (1 << (frame % 64)) != 0
    }

    fn set_used(&mut self, frame: usize) {
        self.bitmap[frame / 64] |= 1 << (frame % 64);
    }

    fn set_free(&mut self, frame: usize) {
        self.bitmap[frame / 64] &= !(1 << (frame % 64));
    }

    /// Reserve a specific frame (kernel image, bitmap pages). No-op if the
    /// frame is already used or out of range.
    pub fn mark_used(&mut self, addr: PhysicalAddress) {
        let frame = addr.frame_number() as usize;
        if frame < self.total_frames && !self.is_used(frame) {
            self.set_used(frame);
            self.free_frames -= 1;
        }
    }

    /// Allocate one frame: first clear bit, scanning ascending.
    pub fn alloc_frame(&mut self) -> Result<PhysicalAddress, MemError> {
        let found = self
            .bitmap
            .iter()
            .enumerate()
            .find(|(_, word)| **word != u64::MAX)
            .map(|(word_idx, word)| word_idx * 64 + word.trailing_ones() as usize);

        match found {
            Some(frame) if frame < self.total_frames => {
                self.set_used(frame);
                self.free_frames -= 1;
                Ok(PhysicalAddress::new((frame * FRAME_SIZE) as u64))
            }
            _ => Err(MemError::OutOfMemory),
        }
    }

    /// Allocate `count` physically contiguous frames, first-fit.
    pub fn alloc_contiguous(&mut self, count: usize) -> Result<PhysicalAddress, MemError> {
        if count == 0 {
            return Err(MemError::InvalidAddress { addr: 0 });
        }

        let mut run_start = 0;
        let mut run_len = 0;
        for frame in 0..self.total_frames {
            if self.is_used(frame) {
                run_len = 0;
                continue;
            }
            if run_len == 0 {
                run_start = frame;
            }
            run_len += 1;
            if run_len == count {
                for f in run_start..run_start + count {
                    self.set_used(f);
                }
                self.free_frames -= count;
                return Ok(PhysicalAddress::new((run_start * FRAME_SIZE) as u64));
            }
        }
        Err(MemError::OutOfMemory)
    }

    /// Free one frame. Fails if the address is out of range, misaligned,
    /// or the frame is already free (double free).
    pub fn free_frame(&mut self, addr: PhysicalAddress) -> Result<(), MemError> {
        if !addr.is_frame_aligned() {
            return Err(MemError::InvalidAddress { addr: addr.as_u64() });
        }
        let frame = addr.frame_number() as usize;
        if frame >= self.total_frames || !self.is_used(frame) {
            return Err(MemError::InvalidAddress { addr: addr.as_u64() });
        }
        self.set_free(frame);
        self.free_frames += 1;
        Ok(())
    }

    /// Free a contiguous run previously handed out by
    /// [`alloc_contiguous`](Self::alloc_contiguous).
    pub fn free_contiguous(
        &mut self,
        addr: PhysicalAddress,
        count: usize,
    ) -> Result<(), MemError> {
        for i in 0..count {
            self.free_frame(PhysicalAddress::new(
                addr.as_u64() + (i * FRAME_SIZE) as u64,
            ))?;
        }
        Ok(())
    }

    pub fn free_frames(&self) -> usize {
        self.free_frames
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }
}

impl Default for FrameAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    fn allocator_with_frames(frames: u64) -> FrameAllocator {
        let mut pmm = FrameAllocator::new();
        pmm.init(frames * FRAME_SIZE as u64);
        pmm
    }

    #[test]
    fn test_alloc_is_ascending_and_deterministic() {
        let mut pmm = allocator_with_frames(16);
        let a = pmm.alloc_frame().unwrap();
        let b = pmm.alloc_frame().unwrap();
        let c = pmm.alloc_frame().unwrap();
        assert_eq!(a, PhysicalAddress::new(0));
        assert_eq!(b, PhysicalAddress::new(FRAME_SIZE as u64));
        assert_eq!(c, PhysicalAddress::new(2 * FRAME_SIZE as u64));
        assert_eq!(pmm.free_frames(), 13);
    }

    #[test]
    fn test_free_reuses_lowest_frame() {
        let mut pmm = allocator_with_frames(16);
        let a = pmm.alloc_frame().unwrap();
        let _b = pmm.alloc_frame().unwrap();
        pmm.free_frame(a).unwrap();
        // First-fit takes the freshly freed low frame again.
        assert_eq!(pmm.alloc_frame().unwrap(), a);
    }

    #[test]
    fn test_double_free_is_invalid_address() {
        let mut pmm = allocator_with_frames(8);
        let a = pmm.alloc_frame().unwrap();
        pmm.free_frame(a).unwrap();
        assert_eq!(
            pmm.free_frame(a),
            Err(MemError::InvalidAddress { addr: a.as_u64() })
        );
    }

    #[test]
    fn test_free_out_of_range_fails() {
        let mut pmm = allocator_with_frames(8);
        let beyond = PhysicalAddress::new(64 * FRAME_SIZE as u64);
        assert!(pmm.free_frame(beyond).is_err());
        let misaligned = PhysicalAddress::new(123);
        assert!(pmm.free_frame(misaligned).is_err());
    }

    #[test]
    fn test_exhaustion_returns_out_of_memory() {
        let mut pmm = allocator_with_frames(4);
        for _ in 0..4 {
            pmm.alloc_frame().unwrap();
        }
        assert_eq!(pmm.alloc_frame(), Err(MemError::OutOfMemory));
    }

    #[test]
    fn test_mark_used_protects_reserved_frames() {
        let mut pmm = allocator_with_frames(8);
        pmm.mark_used(PhysicalAddress::new(0));
        pmm.mark_used(PhysicalAddress::new(FRAME_SIZE as u64));
        assert_eq!(pmm.free_frames(), 6);
        assert_eq!(
            pmm.alloc_frame().unwrap(),
            PhysicalAddress::new(2 * FRAME_SIZE as u64)
        );
    }

    #[test]
    fn test_contiguous_allocation_skips_holes() {
        let mut pmm = allocator_with_frames(16);
        let a = pmm.alloc_frame().unwrap(); // frame 0
        let _b = pmm.alloc_frame().unwrap(); // frame 1
        pmm.free_frame(a).unwrap(); // hole of size 1 at frame 0

        let run = pmm.alloc_contiguous(3).unwrap();
        assert_eq!(run, PhysicalAddress::new(2 * FRAME_SIZE as u64));
        pmm.free_contiguous(run, 3).unwrap();
        assert_eq!(pmm.free_frames(), 15);
    }
}
