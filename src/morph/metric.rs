use std::{fmt, str::FromStr};

use anyhow::{bail, Result};

/// Element a metric is measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Building,
    Cell,
}

/// Morphometric characters, named by their momepy-style codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    /// Building area.
    SdbAre,
    /// Building elongation.
    SsbElo,
    /// Std of building centroid-corner distances.
    SsbCcd,
    /// Building orientation.
    StbOri,
    /// Cell area.
    SdcAre,
    /// Cell equivalent rectangular index.
    SscEri,
    /// Cell orientation.
    StcOri,
    /// Coverage area ratio of a cell.
    SicCar,
    /// Alignment with neighbouring buildings.
    MtbAli,
    /// Mean distance to neighbouring buildings.
    MtbNdi,
    /// Log of `MtbNdi`.
    MtbNdiLog,
    /// Perimeter-weighted neighbour count of a cell.
    MtcWne,
    /// Area covered by a cell and its neighbours.
    MdcAre,
    /// Mean inter-building distance.
    LtbIbd,
    /// Building adjacency.
    LtcBua,
    /// Area-weighted count of blocks.
    LtcWrb,
    /// Alignment of a building with its street.
    StrAli,
}

impl Metric {
    /// Every metric, in dependency order.
    pub const ALL: [Metric; 17] = [
        Metric::SdbAre, Metric::SsbElo, Metric::SsbCcd, Metric::StbOri,
        Metric::SdcAre, Metric::SscEri, Metric::StcOri, Metric::SicCar,
        Metric::MtbAli, Metric::MtbNdi, Metric::MtbNdiLog, Metric::MtcWne,
        Metric::MdcAre, Metric::LtbIbd, Metric::LtcBua, Metric::LtcWrb,
        Metric::StrAli,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Metric::SdbAre => "sdbAre",
            Metric::SsbElo => "ssbElo",
            Metric::SsbCcd => "ssbCCD",
            Metric::StbOri => "stbOri",
            Metric::SdcAre => "sdcAre",
            Metric::SscEri => "sscERI",
            Metric::StcOri => "stcOri",
            Metric::SicCar => "sicCAR",
            Metric::MtbAli => "mtbAli",
            Metric::MtbNdi => "mtbNDi",
            Metric::MtbNdiLog => "mtbNDi_log",
            Metric::MtcWne => "mtcWNe",
            Metric::MdcAre => "mdcAre",
            Metric::LtbIbd => "ltbIBD",
            Metric::LtcBua => "ltcBuA",
            Metric::LtcWrb => "ltcWRB",
            Metric::StrAli => "strAli",
        }
    }

    pub fn target(&self) -> Target {
        match self {
            Metric::SdcAre | Metric::SscEri | Metric::StcOri | Metric::SicCar
            | Metric::MtcWne | Metric::MdcAre | Metric::LtcWrb => Target::Cell,
            _ => Target::Building,
        }
    }

    /// Metrics that must be available before this one.
    pub fn dependencies(&self) -> &'static [Metric] {
        match self {
            Metric::SicCar => &[Metric::SdbAre, Metric::SdcAre],
            Metric::MtbAli | Metric::StrAli => &[Metric::StbOri],
            Metric::MtbNdiLog => &[Metric::MtbNdi],
            Metric::MdcAre | Metric::LtcWrb => &[Metric::SdcAre],
            _ => &[],
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match Metric::ALL.iter().find(|m| m.code() == s) {
            Some(&metric) => Ok(metric),
            None => bail!("Unknown metric: {s}"),
        }
    }
}
