use thiserror::Error;


/// run-length payload faults, always fatal to the payload being decoded
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid flag {0:#04x}")]
    InvalidFlag(u8),

    #[error("stream truncated at byte {0}")]
    Truncated(usize),
}


// control byte layout
// |7|6|5|4|3|2|1|0|
// | family|s|  n  |   high nibble selects family and size class, low nibble are count bits 0..3
//
// 0x0?, 0x1?, 0x2?  literal run, N bytes copied from the stream
// 0x8?, 0x9?, 0xA?  repeat run, one data byte emitted N times
// 0xC?, 0xD?, 0xE?  zero run, N zero bytes, nothing consumed
// size class 0 counts up to 0xf, class 1 appends one count byte, class 2 two count bytes (MSB first)

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Run {
    Literal,
    Repeat,
    Zero,
}


fn classify(control: u8) -> Result<(Run, usize), CodecError> {
    let run = match control >> 4 {
        0x0..=0x2 => Run::Literal,
        0x8..=0xA => Run::Repeat,
        0xC..=0xE => Run::Zero,
        _ => return Err(CodecError::InvalidFlag(control)),
    };
    let size_class = ((control >> 4) & 0x3) as usize;
    Ok((run, size_class))
}


struct Stream<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Stream<'a> {
    #[inline]
    fn next_byte(&mut self) -> Option<u8> {
        let b = self.data.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    #[inline]
    fn required_byte(&mut self) -> Result<u8, CodecError> {
        self.next_byte().ok_or(CodecError::Truncated(self.pos))
    }

    /// takes up to `len` bytes, fewer when the stream ends first
    fn take_up_to(&mut self, len: usize) -> &'a [u8] {
        let end = (self.pos + len).min(self.data.len());
        let slice = &self.data[self.pos..end];
        self.pos = end;
        slice
    }
}


/// Decodes a run-length encoded graphic payload.
///
/// A clean end of input between runs finishes the decode. A literal run cut short by the end of
/// input is padded with zeros to its declared length; a missing count or repeat byte is an error.
pub fn decode(encoded: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoded = Vec::with_capacity(encoded.len() * 2);
    let mut stream = Stream { data: encoded, pos: 0 };

    while let Some(control) = stream.next_byte() {
        let (run, size_class) = classify(control)?;

        // repeat runs carry the data byte before the count extension
        let data = match run {
            Run::Repeat => Some(stream.required_byte()?),
            _ => None,
        };

        let mut count = (control & 0x0f) as usize;
        for _ in 0..size_class {
            count = (count << 8) | stream.required_byte()? as usize;
        }

        match run {
            Run::Literal => {
                let literal = stream.take_up_to(count);
                decoded.extend_from_slice(literal);
                decoded.resize(decoded.len() + (count - literal.len()), 0);
            }
            Run::Repeat => {
                let data = data.unwrap_or_default();
                decoded.resize(decoded.len() + count, data);
            }
            Run::Zero => {
                decoded.resize(decoded.len() + count, 0);
            }
        }
    }

    Ok(decoded)
}
