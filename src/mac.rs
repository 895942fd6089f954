use std::fmt;
use std::str::FromStr;

/// 6-byte link-layer hardware address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct MacAddr([u8; 6]);

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected 6 octets, found {0}")]
    WrongOctetCount(usize),
    #[error("invalid octet {0:?}")]
    BadOctet(String),
}

impl MacAddr {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        MacAddr(octets)
    }
}

impl FromStr for MacAddr {
    type Err = ParseError;

    /// Accepts colon- or hyphen-separated hex octets, case-insensitive,
    /// one or two digits per group ("00:1B:44:11:3a:B7", "0-1b-44-11-3a-b7").
    fn from_str(s: &str) -> Result<MacAddr, ParseError> {
        let sep = if s.contains(':') { ':' } else { '-' };
        let mut octets = [0u8; 6];
        let mut count = 0;
        for group in s.split(sep) {
            if count == 6 {
                return Err(ParseError::WrongOctetCount(s.split(sep).count()));
            }
            if group.is_empty() || group.len() > 2 {
                return Err(ParseError::BadOctet(group.to_string()));
            }
            octets[count] = u8::from_str_radix(group, 16)
                .map_err(|_| ParseError::BadOctet(group.to_string()))?;
            count += 1;
        }
        if count != 6 {
            return Err(ParseError::WrongOctetCount(count));
        }
        Ok(MacAddr(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}
