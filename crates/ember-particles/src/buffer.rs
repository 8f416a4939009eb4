//! Multi-buffered GPU-visible data.
//!
//! An emitter writes one buffer while the renderer may still be reading the
//! one it wrote last frame. The swap mode picks the write index.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Which backing buffer an emitter writes each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferSwapMode {
    /// Always buffer 0; the caller guarantees no draw is in flight
    None,
    /// Alternate between buffers 0 and 1
    Swap,
    /// Rotate through every buffer the emitter owns (2 or 3)
    #[default]
    Auto,
}

/// N-deep ring of typed buffers
#[derive(Debug, Clone)]
pub struct MultiBuffer<T: Pod> {
    buffers: Vec<Vec<T>>,
    /// Index of the last successful `begin_write`, `None` before the first
    write: Option<usize>,
    read: Option<usize>,
    generation: u64,
}

impl<T: Pod> MultiBuffer<T> {
    /// `depth` is clamped to 1..=3
    pub fn new(depth: usize) -> Self {
        let depth = depth.clamp(1, 3);
        Self {
            buffers: vec![Vec::new(); depth],
            write: None,
            read: None,
            generation: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.buffers.len()
    }

    fn next_index(&self, mode: BufferSwapMode) -> usize {
        let depth = self.buffers.len();
        let Some(last) = self.write else {
            return 0;
        };
        match mode {
            BufferSwapMode::None => 0,
            BufferSwapMode::Swap => {
                if depth < 2 {
                    0
                } else {
                    (last + 1) % 2
                }
            }
            BufferSwapMode::Auto => (last + 1) % depth,
        }
    }

    /// Select the write buffer for this frame, cleared and with room for
    /// `capacity` records. `None` when the reservation fails; the previous
    /// frame's read buffer stays current, even when it is the write target.
    pub fn begin_write(&mut self, mode: BufferSwapMode, capacity: usize) -> Option<&mut Vec<T>> {
        let index = self.next_index(mode);
        let buffer = &mut self.buffers[index];
        // Contents survive a failed reservation
        let additional = capacity.saturating_sub(buffer.len());
        buffer.try_reserve_exact(additional).ok()?;
        buffer.clear();
        self.write = Some(index);
        Some(buffer)
    }

    /// Publish the buffer written by the last `begin_write`
    pub fn commit(&mut self) -> u64 {
        self.read = Some(self.write.unwrap_or(0));
        self.generation += 1;
        self.generation
    }

    pub fn write_index(&self) -> usize {
        self.write.unwrap_or(0)
    }

    pub fn read_index(&self) -> Option<usize> {
        self.read
    }

    /// Bumped on every commit
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The most recently committed buffer
    pub fn read(&self) -> &[T] {
        match self.read {
            Some(i) => &self.buffers[i],
            None => &[],
        }
    }
}

/// Emitter-wide uniform block for the particle shader. 208 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct EmitterDynamicConstants {
    /// Emitter color0, alpha0 in w
    pub color0: [f32; 4],
    /// Emitter color1, alpha1 in w
    pub color1: [f32; 4],
    /// xyz = particle scale, w = gravity scale
    pub particle_scale: [f32; 4],
    /// x = emitter time, y = frame rate, z = fade ratio (1 while emitting),
    /// w = live particle count
    pub time: [f32; 4],
    /// Emitter scale-rotate-translate matrix, column major
    pub emitter_srt: [[f32; 4]; 4],
    /// Emitter rotate-translate matrix, column major
    pub emitter_rt: [[f32; 4]; 4],
    /// x = random seed, y = buffer generation (low 32 bits), zw unused
    pub misc: [u32; 4],
}

impl Default for EmitterDynamicConstants {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writes(buf: &mut MultiBuffer<u32>, mode: BufferSwapMode, frames: usize) -> Vec<usize> {
        (0..frames)
            .map(|frame| {
                let b = buf.begin_write(mode, 4).unwrap();
                b.push(frame as u32);
                buf.commit();
                buf.write_index()
            })
            .collect()
    }

    #[test]
    fn none_mode_always_writes_buffer_zero() {
        let mut buf = MultiBuffer::<u32>::new(2);
        assert_eq!(writes(&mut buf, BufferSwapMode::None, 4), vec![0, 0, 0, 0]);
    }

    #[test]
    fn swap_mode_alternates() {
        let mut buf = MultiBuffer::<u32>::new(3);
        assert_eq!(writes(&mut buf, BufferSwapMode::Swap, 4), vec![0, 1, 0, 1]);
    }

    #[test]
    fn auto_mode_rotates_through_depth() {
        let mut buf = MultiBuffer::<u32>::new(3);
        assert_eq!(writes(&mut buf, BufferSwapMode::Auto, 6), vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn write_never_targets_the_published_buffer() {
        for mode in [BufferSwapMode::Swap, BufferSwapMode::Auto] {
            let mut buf = MultiBuffer::<u32>::new(2);
            for frame in 0..8u32 {
                let published = buf.read_index();
                buf.begin_write(mode, 1).unwrap().push(frame);
                assert_ne!(Some(buf.write_index()), published);
                buf.commit();
                assert_eq!(buf.read(), &[frame]);
            }
        }
    }

    #[test]
    fn read_is_empty_before_first_commit() {
        let buf = MultiBuffer::<u32>::new(5);
        assert_eq!(buf.depth(), 3);
        assert!(buf.read().is_empty());
        assert_eq!(buf.generation(), 0);
    }

    #[test]
    fn failed_reservation_keeps_previous_frame() {
        let mut buf = MultiBuffer::<[f32; 16]>::new(2);
        buf.begin_write(BufferSwapMode::Auto, 1).unwrap().push([1.0; 16]);
        buf.commit();
        assert!(buf.begin_write(BufferSwapMode::Auto, usize::MAX).is_none());
        assert_eq!(buf.read().len(), 1);
        assert_eq!(buf.generation(), 1);
    }

    #[test]
    fn failed_reservation_in_none_mode_keeps_published_frame() {
        let mut buf = MultiBuffer::<[f32; 16]>::new(2);
        buf.begin_write(BufferSwapMode::None, 1).unwrap().push([2.0; 16]);
        buf.commit();
        assert_eq!(buf.read_index(), Some(0));
        assert!(buf.begin_write(BufferSwapMode::None, usize::MAX).is_none());
        assert_eq!(buf.read(), &[[2.0; 16]]);
    }

    #[test]
    fn swap_mode_starts_at_buffer_zero_for_any_depth() {
        for depth in 1..=3 {
            let mut buf = MultiBuffer::<u32>::new(depth);
            let expected = if depth < 2 { vec![0, 0, 0] } else { vec![0, 1, 0] };
            assert_eq!(writes(&mut buf, BufferSwapMode::Swap, 3), expected);
        }
    }

    #[test]
    fn constants_layout() {
        assert_eq!(std::mem::size_of::<EmitterDynamicConstants>(), 208);
    }
}
