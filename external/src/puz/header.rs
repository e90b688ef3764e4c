use crate::error::{ExternalError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use xword_core::Checksums;

pub(crate) const MAGIC: &[u8; 12] = b"ACROSS&DOWN\0";

/// Fixed 52 byte header at the start of every binary puzzle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Header {
    pub checksums: Checksums,
    pub version: [u8; 4],
    pub reserved: [u8; 14],
    pub scrambled_cksum: u16,
    pub width: u8,
    pub height: u8,
    pub num_clues: u16,
    pub grid_type: u16,
    pub flags: u16,
}

fn truncated(err: io::Error) -> ExternalError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        ExternalError::malformed("file ends inside the header")
    } else {
        ExternalError::Io(err)
    }
}

impl Header {
    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let mut start = [0u8; 14];
        r.read_exact(&mut start)
            .map_err(|_| ExternalError::FileType("puz"))?;
        if &start[2..] != MAGIC {
            return Err(ExternalError::FileType("puz"));
        }
        let primary = u16::from_le_bytes([start[0], start[1]]);
        Self::read_rest(r, primary).map_err(truncated)?.validated()
    }

    fn read_rest<R: Read>(r: &mut R, primary: u16) -> io::Result<Self> {
        let cib = r.read_u16::<LittleEndian>()?;
        let mut masked = [0u8; 8];
        r.read_exact(&mut masked)?;
        let mut version = [0u8; 4];
        r.read_exact(&mut version)?;

        let mut reserved = [0u8; 14];
        r.read_exact(&mut reserved[..2])?;
        let scrambled_cksum = r.read_u16::<LittleEndian>()?;
        r.read_exact(&mut reserved[2..])?;

        Ok(Self {
            checksums: Checksums {
                cib,
                primary,
                masked,
            },
            version,
            reserved,
            scrambled_cksum,
            width: r.read_u8()?,
            height: r.read_u8()?,
            num_clues: r.read_u16::<LittleEndian>()?,
            grid_type: r.read_u16::<LittleEndian>()?,
            flags: r.read_u16::<LittleEndian>()?,
        })
    }

    /// Versions are "major.minor"; only 1.x and 2.x are understood.
    fn validated(self) -> Result<Self> {
        let v = self.version;
        if !v[0].is_ascii_digit() || !v[2].is_ascii_digit() || v[0] > b'2' {
            let shown = String::from_utf8_lossy(&v).trim_end_matches('\0').to_string();
            return Err(ExternalError::UnsupportedVersion(shown));
        }
        Ok(self)
    }

    pub fn cib(&self) -> [u8; 8] {
        let clues = self.num_clues.to_le_bytes();
        let grid_type = self.grid_type.to_le_bytes();
        let flags = self.flags.to_le_bytes();
        [
            self.width,
            self.height,
            clues[0],
            clues[1],
            grid_type[0],
            grid_type[1],
            flags[0],
            flags[1],
        ]
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u16::<LittleEndian>(self.checksums.primary)?;
        w.write_all(MAGIC)?;
        w.write_u16::<LittleEndian>(self.checksums.cib)?;
        w.write_all(&self.checksums.masked)?;
        w.write_all(&self.version)?;
        w.write_all(&self.reserved[..2])?;
        w.write_u16::<LittleEndian>(self.scrambled_cksum)?;
        w.write_all(&self.reserved[2..])?;
        w.write_u8(self.width)?;
        w.write_u8(self.height)?;
        w.write_u16::<LittleEndian>(self.num_clues)?;
        w.write_u16::<LittleEndian>(self.grid_type)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        Ok(())
    }
}
