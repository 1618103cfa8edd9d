use clap::ValueEnum;
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Which of a step's profitable cycles get traded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// The most profitable cycle that can be executed
    #[display("best_cycle")]
    #[value(name = "best_cycle")]
    BestCycle,
    /// Every profitable cycle, most profitable first
    #[default]
    #[display("all_cycles")]
    #[value(name = "all_cycles")]
    AllCycles,
}

impl Strategy {
    /// Maximum number of trades per step, `None` when unbounded.
    ///
    /// Cycles are attempted in rank order until the limit is reached, so a
    /// skipped cycle never uses up the step.
    #[must_use]
    pub const fn trade_limit(self) -> Option<usize> {
        match self {
            Self::BestCycle => Some(1),
            Self::AllCycles => None,
        }
    }

    /// Whether a step that already traded `traded` cycles may try another
    #[must_use]
    pub const fn wants_more(self, traded: usize) -> bool {
        !matches!(self.trade_limit(), Some(limit) if traded >= limit)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_limit() {
        assert_eq!(Strategy::BestCycle.trade_limit(), Some(1));
        assert_eq!(Strategy::AllCycles.trade_limit(), None);

        assert!(Strategy::BestCycle.wants_more(0));
        assert!(!Strategy::BestCycle.wants_more(1));
        assert!(Strategy::AllCycles.wants_more(1_000));
    }

    #[test]
    fn test_default_trades_every_cycle() {
        assert_eq!(Strategy::default(), Strategy::AllCycles);
        let strategy: Strategy = serde_json::from_value(serde_json::json!("best_cycle")).unwrap();
        assert_eq!(strategy, Strategy::BestCycle);
    }

    #[test]
    fn test_keys() {
        assert_eq!(Strategy::AllCycles.to_string(), "all_cycles");
        let strategy: Strategy = serde_json::from_str("\"all_cycles\"").unwrap();
        assert_eq!(strategy, Strategy::AllCycles);
        assert_eq!(
            Strategy::from_str("best_cycle", true).unwrap(),
            Strategy::BestCycle
        );
    }
}
