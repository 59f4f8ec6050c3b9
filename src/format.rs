//! Binary framing for archive records.
//!
//! An archive is a bare concatenation of records; end of file marks end of
//! archive. All integers are little-endian. One record:
//!
//! ```text
//! total_size:   u32            -- bytes after this field, digest excluded
//! path_len:     u32
//! path_bytes:   u8[path_len]   -- UTF-8, '/'-separated relative path
//! sequence_id:  u32
//! is_last_chunk:u8             -- 0 or 1
//! payload:      u8[total_size - 9 - path_len]   -- one zlib stream
//! digest:       u8[32]         -- lowercase hex MD5 of the whole original
//!                                 file; present only when is_last_chunk = 1
//! ```

use std::io::{self, Read, Write};

/// Width of the hex-encoded whole-file MD5 digest.
pub const DIGEST_LEN: usize = 32;

/// Fixed framing bytes inside `total_size`: path_len + sequence_id + flag.
const FRAMING_OVERHEAD: usize = 4 + 4 + 1;

/// One decoded archive record. `digest` is `Some` exactly when
/// `is_last_chunk` is set.
#[derive(Debug)]
pub struct ArchiveRecord {
    pub relative_path: String,
    pub sequence_id: u32,
    pub is_last_chunk: bool,
    /// Still-compressed chunk payload.
    pub payload: Vec<u8>,
    pub digest: Option<String>,
}

/// Append one record to `dest`. `digest` must be given iff `is_last_chunk`.
pub fn write_record<W: Write>(
    dest: &mut W,
    relative_path: &str,
    sequence_id: u32,
    is_last_chunk: bool,
    payload: &[u8],
    digest: Option<&str>,
) -> io::Result<()> {
    debug_assert_eq!(is_last_chunk, digest.is_some());

    let path_bytes = relative_path.as_bytes();
    let total_size = (FRAMING_OVERHEAD + path_bytes.len() + payload.len()) as u32;

    dest.write_all(&total_size.to_le_bytes())?;
    dest.write_all(&(path_bytes.len() as u32).to_le_bytes())?;
    dest.write_all(path_bytes)?;
    dest.write_all(&sequence_id.to_le_bytes())?;
    dest.write_all(&[is_last_chunk as u8])?;
    dest.write_all(payload)?;
    if let Some(digest) = digest {
        debug_assert_eq!(digest.len(), DIGEST_LEN);
        dest.write_all(digest.as_bytes())?;
    }
    Ok(())
}

/// Read the next record, or `None` on a clean end of archive. A record cut
/// off mid-way, an impossible size field, or a non-UTF-8 path surfaces as
/// `InvalidData`.
pub fn read_record<R: Read>(source: &mut R) -> io::Result<Option<ArchiveRecord>> {
    let mut size_buf = [0u8; 4];
    if !try_read_exact(source, &mut size_buf)? {
        return Ok(None);
    }
    let total_size = u32::from_le_bytes(size_buf) as usize;

    let mut len_buf = [0u8; 4];
    source.read_exact(&mut len_buf)?;
    let path_len = u32::from_le_bytes(len_buf) as usize;

    if total_size < FRAMING_OVERHEAD + path_len {
        return Err(invalid(format!(
            "record size {} too small for path of {} bytes",
            total_size, path_len
        )));
    }

    let mut path_bytes = vec![0u8; path_len];
    source.read_exact(&mut path_bytes)?;
    let relative_path = String::from_utf8(path_bytes)
        .map_err(|_| invalid("record path is not valid UTF-8".to_string()))?;

    let mut seq_buf = [0u8; 4];
    source.read_exact(&mut seq_buf)?;
    let sequence_id = u32::from_le_bytes(seq_buf);

    let mut flag = [0u8; 1];
    source.read_exact(&mut flag)?;
    let is_last_chunk = match flag[0] {
        0 => false,
        1 => true,
        other => return Err(invalid(format!("bad last-chunk flag {}", other))),
    };

    let payload_len = total_size - FRAMING_OVERHEAD - path_len;
    let mut payload = vec![0u8; payload_len];
    source.read_exact(&mut payload)?;

    let digest = if is_last_chunk {
        let mut digest_buf = [0u8; DIGEST_LEN];
        source.read_exact(&mut digest_buf)?;
        let digest = std::str::from_utf8(&digest_buf)
            .map_err(|_| invalid("digest is not valid UTF-8".to_string()))?;
        if !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid("digest is not hex".to_string()));
        }
        Some(digest.to_string())
    } else {
        None
    };

    Ok(Some(ArchiveRecord {
        relative_path,
        sequence_id,
        is_last_chunk,
        payload,
        digest,
    }))
}

fn invalid(detail: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, detail)
}

/// `read_exact`, except that zero bytes before the first byte of `buf` is a
/// clean EOF (`Ok(false)`) rather than an error.
fn try_read_exact<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "archive truncated inside a record",
            ));
        }
        filled += n;
    }
    Ok(true)
}
