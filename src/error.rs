use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoachError {
    NoSentinelRow { scanned_rows: u32 },
    EmptyCapture,
    InvalidSlotId { raw: String },
    UnknownGuard { slot: String, guard: String },
    UnknownSlot { context: String, slot: String },
    MissingSpecData { data_dir: PathBuf },
}

impl fmt::Display for CoachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSentinelRow { scanned_rows } => write!(
                f,
                "no sentinel row found in the bottom {scanned_rows} rows; is the telemetry strip visible?"
            ),
            Self::EmptyCapture => write!(f, "screen capture returned no pixels"),
            Self::InvalidSlotId { raw } => write!(f, "invalid slot id: {raw:?}"),
            Self::UnknownGuard { slot, guard } => {
                write!(f, "unknown guard {guard:?} in {slot}")
            }
            Self::UnknownSlot { context, slot } => {
                write!(f, "{context} references missing slot {slot}")
            }
            Self::MissingSpecData { data_dir } => write!(
                f,
                "no spec files found under {}",
                data_dir.join("specs").display()
            ),
        }
    }
}

impl std::error::Error for CoachError {}
