use crate::types::Error;
use crate::types::Result;

/// A cursor tracks the read position within one borrowed message slice.
///
/// The slice end is the message boundary: every read is checked against it.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    slice: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(slice: &'a [u8]) -> Self {
        Self { slice, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.slice.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    #[inline]
    pub(crate) fn need(&self, n: usize) -> Result<()> {
        if n > self.remaining() {
            Err(Error::UnexpectedEnd { needed: n, available: self.remaining() })
        } else {
            Ok(())
        }
    }

    pub(crate) fn read_word(&mut self) -> Result<[u8; 4]> {
        self.need(4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.slice[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(word)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        self.read_word().map(u32::from_le_bytes)
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32> {
        self.read_word().map(i32::from_le_bytes)
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.need(len)?;
        let slice = &self.slice[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<()> {
        self.need(len)?;
        self.pos += len;
        Ok(())
    }

    pub fn as_slice(&self) -> &'a [u8] {
        &self.slice[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_basic() {
        let data = [1u8, 0, 0, 0, 0xff, 0xff, 0xff, 0xff];
        let mut cursor = Cursor::new(&data);

        assert_eq!(cursor.pos(), 0);
        assert_eq!(cursor.remaining(), 8);

        assert_eq!(cursor.read_u32().unwrap(), 1);
        assert_eq!(cursor.read_i32().unwrap(), -1);
        assert!(cursor.is_empty());
    }

    #[test]
    fn cursor_bytes_and_skip() {
        let data = b"hello world!";
        let mut cursor = Cursor::new(data);

        assert_eq!(cursor.read_bytes(5).unwrap(), b"hello");
        cursor.skip(1).unwrap();
        assert_eq!(cursor.as_slice(), b"world!");
    }

    #[test]
    fn cursor_reports_shortfall() {
        let data = b"abc";
        let mut cursor = Cursor::new(data);

        match cursor.read_u32() {
            Err(Error::UnexpectedEnd { needed, available }) => {
                assert_eq!(needed, 4);
                assert_eq!(available, 3);
            }
            other => panic!("Expected UnexpectedEnd, got {:?}", other),
        }
        // a failed read does not move the cursor
        assert_eq!(cursor.pos(), 0);
    }
}
