/*!
Endpoint IDs in the compressed (CBHE, RFC 6260) `ipn` scheme.

An endpoint is the pair of a node number and a service number, rendered
textually as `ipn:<node>.<service>`.
*/

use thiserror::Error;

/// Longest accepted textual EID, terminator included.
pub const MAX_EID_STRING: usize = 128;

/// Errors that can occur parsing a textual EID.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EidError {
    /// The string is shorter than the shortest valid EID (`ipn:1.1`).
    #[error("EID must be at least 7 characters, got {0}")]
    TooShort(usize),

    /// The string exceeds [`MAX_EID_STRING`].
    #[error("EID cannot exceed {MAX_EID_STRING} characters, got {0}")]
    TooLong(usize),

    /// The scheme is not `ipn`.
    #[error("EID must start with 'ipn:'")]
    UnsupportedScheme,

    /// The node and service numbers are not separated by a dot.
    #[error("EID has no dotted node.service notation")]
    MissingDot,

    /// A component is not a parseable base-10 number.
    #[error("Invalid number in EID: {0}")]
    InvalidNumber(#[from] core::num::ParseIntError),

    /// A zero-valued node or service number.
    ///
    /// RFC 5050 does not forbid service zero; rejecting it is retained for
    /// compatibility with existing ground tooling.
    #[error("EID node and service numbers must be non-zero")]
    ZeroComponent,
}

/// A CBHE endpoint: node number and service number.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Eid {
    pub node: u64,
    pub service: u64,
}

impl Eid {
    pub const fn new(node: u64, service: u64) -> Self {
        Self { node, service }
    }
}

impl core::fmt::Display for Eid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ipn:{}.{}", self.node, self.service)
    }
}

impl core::str::FromStr for Eid {
    type Err = EidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 7 {
            return Err(EidError::TooShort(s.len()));
        } else if s.len() > MAX_EID_STRING {
            return Err(EidError::TooLong(s.len()));
        }

        let Some(s) = s.strip_prefix("ipn:") else {
            return Err(EidError::UnsupportedScheme);
        };
        let Some((node, service)) = s.split_once('.') else {
            return Err(EidError::MissingDot);
        };

        let node: u64 = node.parse()?;
        let service: u64 = service.parse()?;
        if node == 0 || service == 0 {
            return Err(EidError::ZeroComponent);
        }
        Ok(Self { node, service })
    }
}

/// The three endpoints a channel speaks for and to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub local: Eid,
    pub destination: Eid,
    pub report_to: Eid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trip() {
        let eid = Eid::new(24, 7);
        assert_eq!(eid.to_string(), "ipn:24.7");
        assert_eq!("ipn:24.7".parse::<Eid>().unwrap(), eid);
    }

    #[test]
    fn boundaries() {
        assert_eq!("ipn:1.1".parse::<Eid>().unwrap(), Eid::new(1, 1));
        assert!(matches!(
            "ipn:0.1".parse::<Eid>(),
            Err(EidError::ZeroComponent)
        ));
        assert!(matches!(
            "ipn:1.0".parse::<Eid>(),
            Err(EidError::ZeroComponent)
        ));
        assert!(matches!(
            "foo:1.1".parse::<Eid>(),
            Err(EidError::UnsupportedScheme)
        ));
        assert!(matches!("ipn:1.1.1".parse::<Eid>(), Err(_)));
        assert!(matches!("ipn:111".parse::<Eid>(), Err(EidError::MissingDot)));
        assert!(matches!("ipn:1".parse::<Eid>(), Err(EidError::TooShort(5))));
        assert!(matches!("".parse::<Eid>(), Err(EidError::TooShort(0))));

        let long = format!("ipn:1.{}", "1".repeat(MAX_EID_STRING));
        assert!(matches!(long.parse::<Eid>(), Err(EidError::TooLong(_))));
    }
}
