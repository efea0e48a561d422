//! Connectivity indices and the command line flags that request them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq, Hash
)]
#[strum(ascii_case_insensitive)]
#[allow(clippy::upper_case_acronyms)]
pub enum ConnectivityIndex {
    /// Number of components
    NC,
    /// Number of links
    NL,
    /// Harary index
    H,
    /// Class coincidence probability
    CCP,
    /// Landscape coincidence probability
    LCP,
    /// Integral index of connectivity
    IIC,
    /// Betweenness centrality
    BC,
    /// Betweenness centrality weighted by IIC
    BCIIC,
    /// Flux
    F,
    /// Area-weighted flux
    AWF,
    /// Probability of connectivity
    PC,
    /// Betweenness centrality weighted by PC
    BCPC,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Computed on links that exist or not
    Binary,
    /// Computed on link probabilities
    Probability,
}

/// How one index is requested
#[derive(Debug, Clone, Copy)]
pub struct IndexRule {
    pub index: ConnectivityIndex,
    pub flag: &'static str,
    pub kind: IndexKind,
    /// Indices Conefor needs alongside this one
    pub implies: &'static [ConnectivityIndex],
}

use ConnectivityIndex::*;

/// Every index in the order its flag is emitted
pub const INDEX_RULES: &[IndexRule] = &[
    IndexRule { index: NC, flag: "-NC", kind: IndexKind::Binary, implies: &[] },
    IndexRule { index: NL, flag: "-NL", kind: IndexKind::Binary, implies: &[] },
    IndexRule { index: H, flag: "-H", kind: IndexKind::Binary, implies: &[] },
    IndexRule { index: CCP, flag: "-CCP", kind: IndexKind::Binary, implies: &[] },
    IndexRule { index: LCP, flag: "-LCP", kind: IndexKind::Binary, implies: &[] },
    IndexRule { index: IIC, flag: "-IIC", kind: IndexKind::Binary, implies: &[] },
    IndexRule { index: BC, flag: "-BC", kind: IndexKind::Binary, implies: &[IIC] },
    IndexRule { index: BCIIC, flag: "-BCIIC", kind: IndexKind::Binary, implies: &[IIC] },
    IndexRule { index: F, flag: "-F", kind: IndexKind::Probability, implies: &[] },
    IndexRule { index: AWF, flag: "-AWF", kind: IndexKind::Probability, implies: &[] },
    IndexRule { index: PC, flag: "-PC", kind: IndexKind::Probability, implies: &[] },
    IndexRule { index: BCPC, flag: "-BCPC", kind: IndexKind::Probability, implies: &[PC] },
];

impl ConnectivityIndex {
    pub fn rule(self) -> &'static IndexRule {
        // Every variant has a row
        INDEX_RULES
            .iter()
            .find(|rule| rule.index == self)
            .unwrap_or(&INDEX_RULES[0])
    }

    pub fn kind(self) -> IndexKind {
        self.rule().kind
    }

    pub fn flag(self) -> &'static str {
        self.rule().flag
    }
}

/// Requested indices plus everything they imply, once each, in table order
pub fn expand(requested: &[ConnectivityIndex]) -> Vec<ConnectivityIndex> {
    INDEX_RULES
        .iter()
        .map(|rule| rule.index)
        .filter(|index| {
            requested
                .iter()
                .any(|r| r == index || r.rule().implies.contains(index))
        })
        .collect()
}
