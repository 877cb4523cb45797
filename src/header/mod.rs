//! Header frame record: `file_name NUL decimal(total_bytes) NUL`, UTF-8.

use thiserror::Error;

const FIELD_SEPARATOR: u8 = 0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("file name is empty")]
    EmptyName,
    #[error("file name {0:?} is not a plain file name")]
    InvalidName(String),
    #[error("file name is not valid UTF-8")]
    NameNotUtf8,
    #[error("header is {len} bytes but a frame holds only {capacity}")]
    TooLarge { len: usize, capacity: usize },
    #[error("expected 2 NUL-terminated fields, found {0}")]
    MissingFields(usize),
    #[error("size field {0:?} is not a non-negative integer")]
    InvalidSize(String),
}

/// Name and size of the stored file, carried by frame 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    pub file_name: String,
    pub total_bytes: u64,
}

fn validate_name(name: &str) -> Result<(), HeaderError> {
    if name.is_empty() {
        return Err(HeaderError::EmptyName);
    }
    let forbidden = |c: char| c == '\0' || c == '/' || c == '\\';
    if name.contains(forbidden) || name == "." || name == ".." {
        return Err(HeaderError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl HeaderRecord {
    pub fn new(file_name: impl Into<String>, total_bytes: u64) -> Result<Self, HeaderError> {
        let file_name = file_name.into();
        validate_name(&file_name)?;
        Ok(Self {
            file_name,
            total_bytes,
        })
    }

    /// Serialize the record, failing if it does not fit in `capacity` bytes.
    pub fn to_bytes(&self, capacity: usize) -> Result<Vec<u8>, HeaderError> {
        let size = self.total_bytes.to_string();
        let len = self.file_name.len() + size.len() + 2;
        if len > capacity {
            return Err(HeaderError::TooLarge { len, capacity });
        }

        let mut out = Vec::with_capacity(len);
        out.extend_from_slice(self.file_name.as_bytes());
        out.push(FIELD_SEPARATOR);
        out.extend_from_slice(size.as_bytes());
        out.push(FIELD_SEPARATOR);
        Ok(out)
    }

    /// Parse the record from a decoded header frame. Bytes after the second
    /// separator are frame padding and are ignored.
    pub fn parse(frame_bytes: &[u8]) -> Result<Self, HeaderError> {
        let mut fields = frame_bytes.splitn(3, |&b| b == FIELD_SEPARATOR);
        let name = fields.next().unwrap_or_default();
        let size = match (fields.next(), fields.next()) {
            (Some(size), Some(_)) => size,
            (Some(_), None) => return Err(HeaderError::MissingFields(1)),
            _ => return Err(HeaderError::MissingFields(0)),
        };

        let file_name = std::str::from_utf8(name).map_err(|_| HeaderError::NameNotUtf8)?;
        validate_name(file_name)?;

        let size = String::from_utf8_lossy(size);
        if size.is_empty() || !size.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HeaderError::InvalidSize(size.into_owned()));
        }
        let total_bytes = size
            .parse::<u64>()
            .map_err(|_| HeaderError::InvalidSize(size.to_string()))?;

        Ok(Self {
            file_name: file_name.to_string(),
            total_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let header = HeaderRecord::new("a.txt", 1).unwrap();
        assert_eq!(header.to_bytes(64).unwrap(), b"a.txt\x001\x00");
    }

    #[test]
    fn test_parse_ignores_padding() {
        let mut bytes = b"report.pdf\x0012345\x00".to_vec();
        bytes.resize(450, 0);
        let header = HeaderRecord::parse(&bytes).unwrap();
        assert_eq!(header.file_name, "report.pdf");
        assert_eq!(header.total_bytes, 12345);
    }

    #[test]
    fn test_utf8_name() {
        let header = HeaderRecord::new("résumé ✓.txt", 0).unwrap();
        let bytes = header.to_bytes(100).unwrap();
        assert_eq!(HeaderRecord::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn test_too_large_rejected() {
        let header = HeaderRecord::new("x".repeat(20), 1234).unwrap();
        assert_eq!(
            header.to_bytes(25),
            Err(HeaderError::TooLarge {
                len: 26,
                capacity: 25
            })
        );
        assert!(header.to_bytes(26).is_ok());
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert_eq!(HeaderRecord::new("", 0), Err(HeaderError::EmptyName));
        for name in ["a\0b", "dir/file", "dir\\file", ".", ".."] {
            assert!(matches!(
                HeaderRecord::new(name, 0),
                Err(HeaderError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn test_parse_missing_fields() {
        assert_eq!(
            HeaderRecord::parse(b"no separators"),
            Err(HeaderError::MissingFields(0))
        );
        assert_eq!(
            HeaderRecord::parse(b"name\x00123"),
            Err(HeaderError::MissingFields(1))
        );
    }

    #[test]
    fn test_parse_bad_size() {
        for bytes in [&b"a\x00\x00"[..], b"a\x00-5\x00", b"a\x0012x\x00", b"a\x00+5\x00"] {
            assert!(matches!(
                HeaderRecord::parse(bytes),
                Err(HeaderError::InvalidSize(_))
            ));
        }
    }

    #[test]
    fn test_parse_all_zero_frame() {
        // a blank frame decodes to an empty name
        assert_eq!(HeaderRecord::parse(&[0u8; 64]), Err(HeaderError::EmptyName));
    }

    #[test]
    fn test_parse_rejects_traversal() {
        assert!(matches!(
            HeaderRecord::parse(b"../etc/passwd\x001\x00"),
            Err(HeaderError::InvalidName(_))
        ));
    }
}
