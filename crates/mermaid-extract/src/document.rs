use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    /// Byte-preserving fallback: each byte maps to the code point of the same value.
    Latin1,
}

/// Decoded markdown input.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: Option<PathBuf>,
    pub text: String,
    pub encoding: Encoding,
}

impl Document {
    pub fn read(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut document = Self::from_reader(&mut reader)?;
        document.path = Some(path.to_path_buf());
        Ok(document)
    }

    pub fn from_reader<R: Read>(reader: &mut BufReader<R>) -> io::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let (text, encoding) = decode(bytes);
        Self {
            path: None,
            text,
            encoding,
        }
    }
}

/// Decodes as UTF-8, retrying as Latin-1 when the input is not valid UTF-8.
pub fn decode(bytes: Vec<u8>) -> (String, Encoding) {
    let bytes = match bytes.strip_prefix(UTF8_BOM) {
        Some(rest) => rest.to_vec(),
        None => bytes,
    };

    match String::from_utf8(bytes) {
        Ok(text) => (text, Encoding::Utf8),
        Err(err) => (decode_latin1(err.as_bytes()), Encoding::Latin1),
    }
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| char::from(byte)).collect()
}
