//! Fight prediction record.

use serde::{Deserialize, Serialize};

/// Predicted outcome of one matchup on the upcoming event card.
///
/// Records are immutable once fetched. Within one event snapshot a record is
/// identified by its [`matchup`](FightRecord::matchup).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FightRecord {
    /// Fighter in the red corner.
    pub red_fighter: String,
    /// Fighter in the blue corner.
    pub blue_fighter: String,
    /// Name of the fighter the prediction service expects to win.
    pub predicted_winner: String,
}

impl FightRecord {
    /// Creates a new record.
    pub fn new(
        red_fighter: impl Into<String>,
        blue_fighter: impl Into<String>,
        predicted_winner: impl Into<String>,
    ) -> Self {
        Self {
            red_fighter: red_fighter.into(),
            blue_fighter: blue_fighter.into(),
            predicted_winner: predicted_winner.into(),
        }
    }

    /// Returns the `(red, blue)` pair identifying this record within an event.
    pub fn matchup(&self) -> (&str, &str) {
        (&self.red_fighter, &self.blue_fighter)
    }
}
