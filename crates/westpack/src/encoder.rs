use crate::arg::Arg;
use crate::arg::round_up4;
use crate::fixed::Fixed;
use crate::types::Error;
use crate::types::Fd;
use crate::types::ObjectId;
use crate::types::Result;

/// Bytes plus out-of-band fd handles: the unit handed to a transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    pub bytes: Vec<u8>,
    pub fds: Vec<Fd>,
}

impl Packet {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, fds: Vec::new() }
    }

    pub fn with_fds(bytes: Vec<u8>, fds: Vec<Fd>) -> Self {
        Self { bytes, fds }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A growable buffer that encodes arguments into the wire format.
#[derive(Debug, Default)]
pub struct Encoder {
    pub buf: Vec<u8>,
    fds: Vec<Fd>,
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            fds: Vec::new(),
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
            fds: Vec::new(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty() && self.fds.is_empty()
    }

    pub fn fds(&self) -> &[Fd] {
        &self.fds
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn into_packet(self) -> Packet {
        Packet {
            bytes: self.buf,
            fds: self.fds,
        }
    }

    /// Takes everything encoded so far, leaving the encoder empty for reuse.
    pub fn take_packet(&mut self) -> Packet {
        Packet {
            bytes: std::mem::take(&mut self.buf),
            fds: std::mem::take(&mut self.fds),
        }
    }

    /// Drops everything written after `len` bytes and `fds` handles.
    pub(crate) fn rewind(&mut self, len: usize, fds: usize) {
        self.buf.truncate(len);
        self.fds.truncate(fds);
    }

    #[inline(always)]
    pub(crate) fn write_u32_raw(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes the length word, the content, then zero padding up to the next word.
    fn write_blob(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > u32::MAX as usize {
            return Err(Error::BlobTooLarge(data.len()));
        }
        self.write_u32_raw(data.len() as u32);
        self.buf.extend_from_slice(data);
        let padded = round_up4(data.len());
        self.buf.resize(self.buf.len() + (padded - data.len()), 0);
        Ok(())
    }

    #[inline]
    pub fn int(&mut self, v: i32) -> Result<&mut Self> {
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(self)
    }

    #[inline]
    pub fn uint(&mut self, v: u32) -> Result<&mut Self> {
        self.write_u32_raw(v);
        Ok(self)
    }

    #[inline]
    pub fn fixed(&mut self, v: Fixed) -> Result<&mut Self> {
        self.buf.extend_from_slice(&v.raw().to_le_bytes());
        Ok(self)
    }

    #[inline]
    pub fn object(&mut self, id: ObjectId) -> Result<&mut Self> {
        self.write_u32_raw(id.0);
        Ok(self)
    }

    #[inline]
    pub fn new_id(&mut self, id: ObjectId) -> Result<&mut Self> {
        self.write_u32_raw(id.0);
        Ok(self)
    }

    pub fn str(&mut self, v: &str) -> Result<&mut Self> {
        self.write_blob(v.as_bytes())?;
        Ok(self)
    }

    pub fn array(&mut self, v: &[u8]) -> Result<&mut Self> {
        self.write_blob(v)?;
        Ok(self)
    }

    /// Queues an fd handle. No bytes are written to the buffer.
    pub fn fd(&mut self, fd: Fd) -> Result<&mut Self> {
        self.fds.push(fd);
        Ok(self)
    }

    pub fn arg(&mut self, arg: &Arg) -> Result<&mut Self> {
        match arg {
            Arg::Int(v) => self.int(*v),
            Arg::Uint(v) => self.uint(*v),
            Arg::Fixed(v) => self.fixed(*v),
            Arg::String(v) => self.str(v),
            Arg::Object(id) => self.object(*id),
            Arg::NewId(id) => self.new_id(*id),
            Arg::Array(v) => self.array(v),
            Arg::Fd(fd) => self.fd(*fd),
        }
    }

    pub fn args(&mut self, args: &[Arg]) -> Result<&mut Self> {
        for arg in args {
            self.arg(arg)?;
        }
        Ok(self)
    }
}
