// ============================================================================
// surface.rs - alife-canvas
// PingPongSurface: two equally sized state textures, one read and one
// written per pass, flipped after every state-changing operation.
// ============================================================================

use crate::config::Size;
use crate::error::{EngineError, Result};
use crate::gpu::{Framebuffer, ResourceFactory, Texture, TextureDescriptor};

/// One half of the surface: a state texture and the framebuffer that writes it.
pub struct Slot {
    texture: Texture,
    framebuffer: Framebuffer,
}

impl Slot {
    fn new(factory: &ResourceFactory, label: &str, size: Size, data: Option<&[u8]>) -> Result<Self> {
        let mut desc = TextureDescriptor::state(size.width, size.height);
        desc.label = label;
        desc.data = data;
        let texture = factory.create_texture(&desc)?;
        let framebuffer = factory.create_framebuffer(&texture)?;
        Ok(Self {
            texture,
            framebuffer,
        })
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }
}

#[derive(Default)]
pub struct PingPongSurface {
    slots: Option<[Slot; 2]>,
    // Index of the slot being read: 0 or 1
    current: usize,
    swaps: u64,
}

impl PingPongSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds two fresh slots from the same contents (zeroes when `data` is
    /// `None`) and only then drops the previous pair. On failure the previous
    /// pair is kept as it was.
    pub fn allocate(&mut self, factory: &ResourceFactory, size: Size, data: Option<&[u8]>) -> Result<()> {
        let slots = [
            Slot::new(factory, "state_a", size, data)?,
            Slot::new(factory, "state_b", size, data)?,
        ];
        if self.slots.replace(slots).is_some() {
            log::debug!("released previous surface for {}", size);
        }
        self.current = 0;
        log::debug!("surface allocated at {}", size);
        Ok(())
    }

    /// (read, write) slots for the next pass.
    pub fn current(&self) -> Result<(&Slot, &Slot)> {
        let slots = self.slots.as_ref().ok_or(EngineError::NotInitialized)?;
        Ok((&slots[self.current], &slots[1 - self.current]))
    }

    /// Makes the slot just written the one read next.
    pub fn swap(&mut self) -> Result<()> {
        if self.slots.is_none() {
            return Err(EngineError::NotInitialized);
        }
        self.current = 1 - self.current;
        self.swaps += 1;
        Ok(())
    }

    pub fn release(&mut self) {
        if self.slots.take().is_some() {
            log::debug!("surface released");
        }
    }

    pub fn size(&self) -> Option<Size> {
        self.slots.as_ref().map(|slots| slots[0].texture.size())
    }

    pub fn read_index(&self) -> usize {
        self.current
    }

    /// Swaps since construction; survives reallocation.
    pub fn swap_count(&self) -> u64 {
        self.swaps
    }

    pub fn is_allocated(&self) -> bool {
        self.slots.is_some()
    }
}
