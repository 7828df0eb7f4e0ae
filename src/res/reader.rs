use std::io::{Error, ErrorKind, Read};
use std::mem;

#[inline]
pub fn res_read_u8<R: Read>(reader: &mut R) -> Result<u8, Error> {
    type V = u8;
    let mut buff = [0; mem::size_of::<V>()];
    reader.read_exact(&mut buff)?;
    Ok(V::from_le_bytes(buff))
}

#[inline]
pub fn res_read_u16<R: Read>(reader: &mut R) -> Result<u16, Error> {
    let mut buff = [0; mem::size_of::<u16>()];
    reader.read_exact(&mut buff)?;
    Ok(u16::from_le_bytes(buff))
}

#[inline]
pub fn res_read_i16<R: Read>(reader: &mut R) -> Result<i16, Error> {
    let mut buff = [0; mem::size_of::<i16>()];
    reader.read_exact(&mut buff)?;
    Ok(i16::from_le_bytes(buff))
}

#[inline]
pub fn res_read_i32<R: Read>(reader: &mut R) -> Result<i32, Error> {
    let mut buff = [0; mem::size_of::<i32>()];
    reader.read_exact(&mut buff)?;
    Ok(i32::from_le_bytes(buff))
}

/// reads a fixed count of raw bytes, magic signatures and reserved gaps
#[inline]
pub fn res_read_bytes<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N], Error> {
    let mut buff = [0; N];
    reader.read_exact(&mut buff)?;
    Ok(buff)
}

/// Reads `len` bytes without trusting `len` for the allocation,
/// the buffer only grows with the bytes actually present.
pub fn res_read_vec<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>, Error> {
    let mut buff = Vec::new();
    reader.take(len).read_to_end(&mut buff)?;
    if (buff.len() as u64) < len {
        return Err(Error::new(ErrorKind::UnexpectedEof, format!("{} of {len} bytes", buff.len())));
    }
    Ok(buff)
}

/// Fills `buff` as far as the reader allows.
/// Returns the number of bytes read, zero only at a clean end of stream.
pub fn res_read_up_to<R: Read>(reader: &mut R, buff: &mut [u8]) -> Result<usize, Error> {
    let mut filled = 0;
    while filled < buff.len() {
        match reader.read(&mut buff[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_little_endian_fields() {
        let mut c = Cursor::new(vec![0x01, 0xfe, 0xff, 0x78, 0x56, 0x34, 0x12, b'R', b'D']);
        assert_eq!(res_read_u8(&mut c).unwrap(), 1);
        assert_eq!(res_read_i16(&mut c).unwrap(), -2);
        assert_eq!(res_read_i32(&mut c).unwrap(), 0x1234_5678);
        assert_eq!(&res_read_bytes::<_, 2>(&mut c).unwrap(), b"RD");
        assert!(res_read_u16(&mut c).is_err());
    }

    #[test]
    fn read_up_to_stops_at_end() {
        let mut c = Cursor::new(vec![1, 2, 3]);
        let mut buff = [0u8; 5];
        assert_eq!(res_read_up_to(&mut c, &mut buff).unwrap(), 3);
        assert_eq!(buff, [1, 2, 3, 0, 0]);
        assert_eq!(res_read_up_to(&mut c, &mut buff).unwrap(), 0);
    }

    #[test]
    fn read_vec_with_huge_length() {
        let mut c = Cursor::new(vec![1, 2, 3]);
        let err = res_read_vec(&mut c, u32::MAX as u64 * 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);

        let mut c = Cursor::new(vec![1, 2, 3]);
        assert_eq!(res_read_vec(&mut c, 2).unwrap(), vec![1, 2]);
    }
}
