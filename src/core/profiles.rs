//! Cable profile catalog
//!
//! A profile describes how the connectors and positions on one end of a cable
//! map onto the other end. Profiles form a closed catalog keyed by a string
//! identifier; each catalog entry dispatches to one of a few mapping
//! implementations (straight, shuffle, breakout).
//!
//! Connector numbers are 1-based and follow the order of a cable's
//! terminations on that end. Positions are 1-based within a connector.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::node::NodeRef;
use crate::entities::link::{Cable, CableEnd};
use crate::entities::termination::TerminationKind;

/// Profile families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFamily {
    /// One connector, one position
    Direct,
    /// One connector carrying N positions, passed through unchanged
    DirectMultiPosition,
    /// M parallel connectors of N positions each, straight through
    Trunk,
    /// M connectors with a fixed (connector, position) permutation
    ShuffleTrunk,
    /// One wide side fanning out to single-position connectors
    Breakout,
}

impl std::fmt::Display for ProfileFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileFamily::Direct => write!(f, "direct"),
            ProfileFamily::DirectMultiPosition => write!(f, "direct multi-position"),
            ProfileFamily::Trunk => write!(f, "trunk"),
            ProfileFamily::ShuffleTrunk => write!(f, "shuffle trunk"),
            ProfileFamily::Breakout => write!(f, "breakout"),
        }
    }
}

/// Result of mapping a local connector/position to the far end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileLookup {
    /// The far-end connector, and the far-end position when one is known
    Mapped { connector: u16, position: Option<u16> },
    /// No position was given and the connector's positions fan out to several connectors
    Ambiguous,
    /// Connector or position outside the profile's table
    Unmapped,
}

/// Result of resolving a peer termination across a profiled cable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilePeer {
    Resolved {
        termination: NodeRef,
        position: Option<u16>,
    },
    /// The mapped far-end connector has nothing attached
    Unterminated { connector: u16 },
    Ambiguous,
    Unmapped,
}

/// Errors raised when checking a cable against its profile
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ProfileError {
    #[error("Unknown cable profile: {0}")]
    #[diagnostic(
        code(cabletrace::profile::unknown),
        help("run `cabletrace profiles` to list the catalog")
    )]
    Unknown(String),

    #[error("Profile {profile} allows at most {max} termination(s) on side {end}, found {actual}")]
    #[diagnostic(code(cabletrace::profile::too_many_terminations))]
    TooManyTerminations {
        profile: CableProfile,
        end: CableEnd,
        max: u16,
        actual: usize,
    },

    #[error("Connector {connector} on side {end} of profile {profile} carries {positions} positions and needs a front or rear port, not {kind}")]
    #[diagnostic(code(cabletrace::profile::multi_position_connector))]
    MultiPositionConnector {
        profile: CableProfile,
        end: CableEnd,
        connector: u16,
        positions: usize,
        kind: String,
    },

    #[error("{port} has {actual} position(s) but connector {connector} on side {end} of profile {profile} carries {expected}")]
    #[diagnostic(
        code(cabletrace::profile::port_position_mismatch),
        help("pick a profile whose connectors carry as many positions as the ports they land on")
    )]
    PortPositionMismatch {
        profile: CableProfile,
        end: CableEnd,
        connector: u16,
        port: NodeRef,
        expected: usize,
        actual: u16,
    },

    #[error("{termination} is not attached to cable #{cable}")]
    #[diagnostic(code(cabletrace::profile::not_attached))]
    NotAttached { cable: u64, termination: NodeRef },
}

/// Dispatch table implemented by every mapping scheme
pub trait ProfileMapping: Sync {
    /// Number of connectors on an end
    fn connectors(&self, end: CableEnd) -> u16;

    /// Positions carried by a connector; empty when the connector does not exist
    fn positions(&self, end: CableEnd, connector: u16) -> Vec<u16>;

    /// Map a concrete (connector, position) to the far end
    fn map_position(&self, end: CableEnd, connector: u16, position: u16) -> Option<(u16, u16)>;

    /// Map a connector and an optional position to the far end
    ///
    /// A missing position on a single-position connector is that position.
    /// A missing position on a multi-position connector resolves only when
    /// every position lands on the same far-end connector; the far-end
    /// position then stays unknown.
    fn resolve(&self, end: CableEnd, connector: u16, position: Option<u16>) -> ProfileLookup {
        let positions = self.positions(end, connector);
        if positions.is_empty() {
            return ProfileLookup::Unmapped;
        }

        let position = match position {
            Some(p) => Some(p),
            None if positions.len() == 1 => Some(positions[0]),
            None => None,
        };

        match position {
            Some(p) => {
                if !positions.contains(&p) {
                    return ProfileLookup::Unmapped;
                }
                match self.map_position(end, connector, p) {
                    Some((connector, position)) => ProfileLookup::Mapped {
                        connector,
                        position: Some(position),
                    },
                    None => ProfileLookup::Unmapped,
                }
            }
            None => {
                let mut targets: Vec<u16> = positions
                    .iter()
                    .filter_map(|p| self.map_position(end, connector, *p))
                    .map(|(c, _)| c)
                    .collect();
                targets.sort_unstable();
                targets.dedup();
                match targets.as_slice() {
                    [connector] => ProfileLookup::Mapped {
                        connector: *connector,
                        position: None,
                    },
                    [] => ProfileLookup::Unmapped,
                    _ => ProfileLookup::Ambiguous,
                }
            }
        }
    }
}

/// Straight-through mapping: connector i position j ↔ connector i position j
struct Straight {
    connectors: u16,
    positions: u16,
}

impl ProfileMapping for Straight {
    fn connectors(&self, _end: CableEnd) -> u16 {
        self.connectors
    }

    fn positions(&self, _end: CableEnd, connector: u16) -> Vec<u16> {
        if (1..=self.connectors).contains(&connector) {
            (1..=self.positions).collect()
        } else {
            Vec::new()
        }
    }

    fn map_position(&self, end: CableEnd, connector: u16, position: u16) -> Option<(u16, u16)> {
        if self.positions(end, connector).contains(&position) {
            Some((connector, position))
        } else {
            None
        }
    }
}

type PositionTable = &'static [((u16, u16), (u16, u16))];

/// Look up an A→B table forwards from side A, backwards from side B
fn lookup(table: PositionTable, end: CableEnd, connector: u16, position: u16) -> Option<(u16, u16)> {
    let key = (connector, position);
    match end {
        CableEnd::A => table.iter().find(|(a, _)| *a == key).map(|(_, b)| *b),
        CableEnd::B => table.iter().find(|(_, b)| *b == key).map(|(a, _)| *a),
    }
}

/// Symmetric connector layout with a fixed permutation between ends
struct Shuffle {
    connectors: u16,
    positions: u16,
    table: PositionTable,
}

impl ProfileMapping for Shuffle {
    fn connectors(&self, _end: CableEnd) -> u16 {
        self.connectors
    }

    fn positions(&self, _end: CableEnd, connector: u16) -> Vec<u16> {
        if (1..=self.connectors).contains(&connector) {
            (1..=self.positions).collect()
        } else {
            Vec::new()
        }
    }

    fn map_position(&self, end: CableEnd, connector: u16, position: u16) -> Option<(u16, u16)> {
        lookup(self.table, end, connector, position)
    }
}

/// Side A has `wide` connectors of `positions` each; side B has one
/// single-position connector per A position
struct Breakout {
    wide: u16,
    positions: u16,
    table: Option<PositionTable>,
}

impl ProfileMapping for Breakout {
    fn connectors(&self, end: CableEnd) -> u16 {
        match end {
            CableEnd::A => self.wide,
            CableEnd::B => self.wide * self.positions,
        }
    }

    fn positions(&self, end: CableEnd, connector: u16) -> Vec<u16> {
        if !(1..=self.connectors(end)).contains(&connector) {
            return Vec::new();
        }
        match end {
            CableEnd::A => (1..=self.positions).collect(),
            CableEnd::B => vec![1],
        }
    }

    fn map_position(&self, end: CableEnd, connector: u16, position: u16) -> Option<(u16, u16)> {
        if !self.positions(end, connector).contains(&position) {
            return None;
        }
        if let Some(table) = self.table {
            return lookup(table, end, connector, position);
        }
        match end {
            CableEnd::A => Some(((connector - 1) * self.positions + position, 1)),
            CableEnd::B => Some((
                (connector - 1) / self.positions + 1,
                (connector - 1) % self.positions + 1,
            )),
        }
    }
}

static SHUFFLE_2C4P: PositionTable = &[
    ((1, 1), (1, 1)),
    ((1, 2), (1, 2)),
    ((1, 3), (2, 1)),
    ((1, 4), (2, 2)),
    ((2, 1), (1, 3)),
    ((2, 2), (1, 4)),
    ((2, 3), (2, 3)),
    ((2, 4), (2, 4)),
];

static SHUFFLE_4C4P: PositionTable = &[
    ((1, 1), (1, 1)),
    ((1, 2), (2, 1)),
    ((1, 3), (3, 1)),
    ((1, 4), (4, 1)),
    ((2, 1), (1, 2)),
    ((2, 2), (2, 2)),
    ((2, 3), (3, 2)),
    ((2, 4), (4, 2)),
    ((3, 1), (1, 3)),
    ((3, 2), (2, 3)),
    ((3, 3), (3, 3)),
    ((3, 4), (4, 3)),
    ((4, 1), (1, 4)),
    ((4, 2), (2, 4)),
    ((4, 3), (3, 4)),
    ((4, 4), (4, 4)),
];

static SHUFFLE_2C4P_8C1P: PositionTable = &[
    ((1, 1), (1, 1)),
    ((1, 2), (2, 1)),
    ((1, 3), (5, 1)),
    ((1, 4), (6, 1)),
    ((2, 1), (3, 1)),
    ((2, 2), (4, 1)),
    ((2, 3), (7, 1)),
    ((2, 4), (8, 1)),
];

static SINGLE_1C1P: Straight = Straight { connectors: 1, positions: 1 };
static SINGLE_1C2P: Straight = Straight { connectors: 1, positions: 2 };
static SINGLE_1C4P: Straight = Straight { connectors: 1, positions: 4 };
static SINGLE_1C6P: Straight = Straight { connectors: 1, positions: 6 };
static SINGLE_1C8P: Straight = Straight { connectors: 1, positions: 8 };
static SINGLE_1C12P: Straight = Straight { connectors: 1, positions: 12 };
static SINGLE_1C16P: Straight = Straight { connectors: 1, positions: 16 };
static TRUNK_2C1P: Straight = Straight { connectors: 2, positions: 1 };
static TRUNK_2C2P: Straight = Straight { connectors: 2, positions: 2 };
static TRUNK_2C4P: Straight = Straight { connectors: 2, positions: 4 };
static TRUNK_2C6P: Straight = Straight { connectors: 2, positions: 6 };
static TRUNK_2C8P: Straight = Straight { connectors: 2, positions: 8 };
static TRUNK_2C12P: Straight = Straight { connectors: 2, positions: 12 };
static TRUNK_4C1P: Straight = Straight { connectors: 4, positions: 1 };
static TRUNK_4C2P: Straight = Straight { connectors: 4, positions: 2 };
static TRUNK_4C4P: Straight = Straight { connectors: 4, positions: 4 };
static TRUNK_4C6P: Straight = Straight { connectors: 4, positions: 6 };
static TRUNK_4C8P: Straight = Straight { connectors: 4, positions: 8 };
static TRUNK_8C4P: Straight = Straight { connectors: 8, positions: 4 };
static TRUNK_2C4P_SHUFFLE: Shuffle = Shuffle {
    connectors: 2,
    positions: 4,
    table: SHUFFLE_2C4P,
};
static TRUNK_4C4P_SHUFFLE: Shuffle = Shuffle {
    connectors: 4,
    positions: 4,
    table: SHUFFLE_4C4P,
};
static BREAKOUT_1C4P_4C1P: Breakout = Breakout {
    wide: 1,
    positions: 4,
    table: None,
};
static BREAKOUT_1C6P_6C1P: Breakout = Breakout {
    wide: 1,
    positions: 6,
    table: None,
};
static BREAKOUT_2C4P_8C1P_SHUFFLE: Breakout = Breakout {
    wide: 2,
    positions: 4,
    table: Some(SHUFFLE_2C4P_8C1P),
};

/// The closed catalog of cable profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CableProfile {
    #[serde(rename = "single-1c1p")]
    Single1C1P,
    #[serde(rename = "single-1c2p")]
    Single1C2P,
    #[serde(rename = "single-1c4p")]
    Single1C4P,
    #[serde(rename = "single-1c6p")]
    Single1C6P,
    #[serde(rename = "single-1c8p")]
    Single1C8P,
    #[serde(rename = "single-1c12p")]
    Single1C12P,
    #[serde(rename = "single-1c16p")]
    Single1C16P,
    #[serde(rename = "trunk-2c1p")]
    Trunk2C1P,
    #[serde(rename = "trunk-2c2p")]
    Trunk2C2P,
    #[serde(rename = "trunk-2c4p")]
    Trunk2C4P,
    #[serde(rename = "trunk-2c4p-shuffle")]
    Trunk2C4PShuffle,
    #[serde(rename = "trunk-2c6p")]
    Trunk2C6P,
    #[serde(rename = "trunk-2c8p")]
    Trunk2C8P,
    #[serde(rename = "trunk-2c12p")]
    Trunk2C12P,
    #[serde(rename = "trunk-4c1p")]
    Trunk4C1P,
    #[serde(rename = "trunk-4c2p")]
    Trunk4C2P,
    #[serde(rename = "trunk-4c4p")]
    Trunk4C4P,
    #[serde(rename = "trunk-4c4p-shuffle")]
    Trunk4C4PShuffle,
    #[serde(rename = "trunk-4c6p")]
    Trunk4C6P,
    #[serde(rename = "trunk-4c8p")]
    Trunk4C8P,
    #[serde(rename = "trunk-8c4p")]
    Trunk8C4P,
    #[serde(rename = "breakout-1c4p-4c1p")]
    Breakout1C4P4C1P,
    #[serde(rename = "breakout-1c6p-6c1p")]
    Breakout1C6P6C1P,
    #[serde(rename = "breakout-2c4p-8c1p-shuffle")]
    Breakout2C4P8C1PShuffle,
}

impl CableProfile {
    /// Every profile in the catalog
    pub fn all() -> &'static [CableProfile] {
        use CableProfile::*;
        &[
            Single1C1P,
            Single1C2P,
            Single1C4P,
            Single1C6P,
            Single1C8P,
            Single1C12P,
            Single1C16P,
            Trunk2C1P,
            Trunk2C2P,
            Trunk2C4P,
            Trunk2C4PShuffle,
            Trunk2C6P,
            Trunk2C8P,
            Trunk2C12P,
            Trunk4C1P,
            Trunk4C2P,
            Trunk4C4P,
            Trunk4C4PShuffle,
            Trunk4C6P,
            Trunk4C8P,
            Trunk8C4P,
            Breakout1C4P4C1P,
            Breakout1C6P6C1P,
            Breakout2C4P8C1PShuffle,
        ]
    }

    /// Catalog key
    pub fn as_str(&self) -> &'static str {
        use CableProfile::*;
        match self {
            Single1C1P => "single-1c1p",
            Single1C2P => "single-1c2p",
            Single1C4P => "single-1c4p",
            Single1C6P => "single-1c6p",
            Single1C8P => "single-1c8p",
            Single1C12P => "single-1c12p",
            Single1C16P => "single-1c16p",
            Trunk2C1P => "trunk-2c1p",
            Trunk2C2P => "trunk-2c2p",
            Trunk2C4P => "trunk-2c4p",
            Trunk2C4PShuffle => "trunk-2c4p-shuffle",
            Trunk2C6P => "trunk-2c6p",
            Trunk2C8P => "trunk-2c8p",
            Trunk2C12P => "trunk-2c12p",
            Trunk4C1P => "trunk-4c1p",
            Trunk4C2P => "trunk-4c2p",
            Trunk4C4P => "trunk-4c4p",
            Trunk4C4PShuffle => "trunk-4c4p-shuffle",
            Trunk4C6P => "trunk-4c6p",
            Trunk4C8P => "trunk-4c8p",
            Trunk8C4P => "trunk-8c4p",
            Breakout1C4P4C1P => "breakout-1c4p-4c1p",
            Breakout1C6P6C1P => "breakout-1c6p-6c1p",
            Breakout2C4P8C1PShuffle => "breakout-2c4p-8c1p-shuffle",
        }
    }

    pub fn family(&self) -> ProfileFamily {
        use CableProfile::*;
        match self {
            Single1C1P => ProfileFamily::Direct,
            Single1C2P | Single1C4P | Single1C6P | Single1C8P | Single1C12P | Single1C16P => {
                ProfileFamily::DirectMultiPosition
            }
            Trunk2C4PShuffle | Trunk4C4PShuffle => ProfileFamily::ShuffleTrunk,
            Breakout1C4P4C1P | Breakout1C6P6C1P | Breakout2C4P8C1PShuffle => {
                ProfileFamily::Breakout
            }
            _ => ProfileFamily::Trunk,
        }
    }

    /// Mapping implementation backing this profile
    pub fn mapping(&self) -> &'static dyn ProfileMapping {
        use CableProfile::*;
        match self {
            Single1C1P => &SINGLE_1C1P,
            Single1C2P => &SINGLE_1C2P,
            Single1C4P => &SINGLE_1C4P,
            Single1C6P => &SINGLE_1C6P,
            Single1C8P => &SINGLE_1C8P,
            Single1C12P => &SINGLE_1C12P,
            Single1C16P => &SINGLE_1C16P,
            Trunk2C1P => &TRUNK_2C1P,
            Trunk2C2P => &TRUNK_2C2P,
            Trunk2C4P => &TRUNK_2C4P,
            Trunk2C4PShuffle => &TRUNK_2C4P_SHUFFLE,
            Trunk2C6P => &TRUNK_2C6P,
            Trunk2C8P => &TRUNK_2C8P,
            Trunk2C12P => &TRUNK_2C12P,
            Trunk4C1P => &TRUNK_4C1P,
            Trunk4C2P => &TRUNK_4C2P,
            Trunk4C4P => &TRUNK_4C4P,
            Trunk4C4PShuffle => &TRUNK_4C4P_SHUFFLE,
            Trunk4C6P => &TRUNK_4C6P,
            Trunk4C8P => &TRUNK_4C8P,
            Trunk8C4P => &TRUNK_8C4P,
            Breakout1C4P4C1P => &BREAKOUT_1C4P_4C1P,
            Breakout1C6P6C1P => &BREAKOUT_1C6P_6C1P,
            Breakout2C4P8C1PShuffle => &BREAKOUT_2C4P_8C1P_SHUFFLE,
        }
    }

    pub fn a_connectors(&self) -> u16 {
        self.mapping().connectors(CableEnd::A)
    }

    pub fn b_connectors(&self) -> u16 {
        self.mapping().connectors(CableEnd::B)
    }

    pub fn connectors(&self, end: CableEnd) -> u16 {
        self.mapping().connectors(end)
    }

    pub fn positions(&self, end: CableEnd, connector: u16) -> Vec<u16> {
        self.mapping().positions(end, connector)
    }

    pub fn resolve(&self, end: CableEnd, connector: u16, position: Option<u16>) -> ProfileLookup {
        self.mapping().resolve(end, connector, position)
    }

    /// Given a termination on `cable` and an optional position, find the
    /// termination and position on the opposite end
    pub fn peer_termination(
        &self,
        cable: &Cable,
        termination: NodeRef,
        position: Option<u16>,
    ) -> Result<ProfilePeer, ProfileError> {
        let (end, connector) = cable
            .end_of(termination)
            .zip(cable.connector_of(termination))
            .ok_or(ProfileError::NotAttached {
                cable: cable.id,
                termination,
            })?;

        Ok(match self.resolve(end, connector, position) {
            ProfileLookup::Mapped {
                connector,
                position,
            } => match cable.termination_at(end.opposite(), connector) {
                Some(termination) => ProfilePeer::Resolved {
                    termination,
                    position,
                },
                None => ProfilePeer::Unterminated { connector },
            },
            ProfileLookup::Ambiguous => ProfilePeer::Ambiguous,
            ProfileLookup::Unmapped => ProfilePeer::Unmapped,
        })
    }

    /// Check the number and kinds of a cable's terminations against the connector table
    pub fn validate(&self, cable: &Cable) -> Result<(), ProfileError> {
        for end in [CableEnd::A, CableEnd::B] {
            let terminations = cable.terminations(end);
            let max = self.connectors(end);
            if terminations.len() > max as usize {
                return Err(ProfileError::TooManyTerminations {
                    profile: *self,
                    end,
                    max,
                    actual: terminations.len(),
                });
            }

            for (i, termination) in terminations.iter().enumerate() {
                let connector = (i + 1) as u16;
                let positions = self.positions(end, connector).len();
                let is_port = matches!(
                    termination.termination_kind(),
                    Some(TerminationKind::FrontPort) | Some(TerminationKind::RearPort)
                );
                if positions > 1 && !is_port {
                    return Err(ProfileError::MultiPositionConnector {
                        profile: *self,
                        end,
                        connector,
                        positions,
                        kind: termination.kind.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Check that a front or rear port carries exactly the positions of its connector
    pub fn validate_port(
        &self,
        end: CableEnd,
        connector: u16,
        port: NodeRef,
        port_positions: u16,
    ) -> Result<(), ProfileError> {
        let expected = self.positions(end, connector).len();
        if expected != port_positions as usize {
            return Err(ProfileError::PortPositionMismatch {
                profile: *self,
                end,
                connector,
                port,
                expected,
                actual: port_positions,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for CableProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CableProfile {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        CableProfile::all()
            .iter()
            .find(|p| p.as_str() == key)
            .copied()
            .ok_or_else(|| ProfileError::Unknown(s.to_string()))
    }
}
