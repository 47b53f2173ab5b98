//! In-memory file backend.

use super::Backend;

/// A [`Backend`] over an owned byte buffer.
#[derive(Debug)]
pub(crate) struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub(crate) fn new(data: Vec<u8>) -> Memory {
        Memory { data }
    }
}

impl Backend for Memory {
    fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory() {
        let memory = Memory::new(vec![0x4D, 0x5A, 0x90]);

        assert_eq!(memory.len(), 3);
        assert_eq!(memory.data()[1], 0x5A);
    }
}
