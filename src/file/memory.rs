use super::Backend;

/// A movie already read into memory, as downloaded or as produced by another tool.
#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Take ownership of the movie bytes in `data`.
    #[must_use]
    pub fn new(data: Vec<u8>) -> Memory {
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
    fn test_memory_keeps_header() {
        let memory = Memory::new(b"CWS\x0A\x20\x00\x00\x00".to_vec());
        assert_eq!(&memory.data()[..3], b"CWS");
        assert_eq!(memory.data().len(), 8);
    }
}
