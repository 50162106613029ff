use serde::{Deserialize, Serialize};

/// What sort of contest this is. Purely presentational; both kinds follow
/// the same voting rules.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionKind {
    Election,
    #[default]
    Poll,
}
