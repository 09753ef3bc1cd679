//! Outcome judgment.
//!
//! Pure win/loss rules applied to a settled price pair. Kept free of
//! storage and I/O so the policy is trivially testable.

use rust_decimal::Decimal;

use crate::types::{Direction, WagerStatus};

/// Payout and tie policy for settled wagers.
#[derive(Debug, Clone, Copy)]
pub struct OutcomeRules {
    /// Win payout as a percentage of the stake (150 = stake * 1.5).
    pub win_multiplier_pct: i64,
    /// Flat points added on top of a winning payout.
    pub win_bonus: i64,
    /// When true an exact price tie refunds the stake as a draw.
    /// Otherwise a tie is a loss under the strict-inequality rule.
    pub refund_ties: bool,
}

impl OutcomeRules {
    /// Judge a settled wager. Returns the terminal status and payout.
    pub fn judge(
        &self,
        direction: Direction,
        stake: i64,
        entry: Decimal,
        exit: Decimal,
    ) -> (WagerStatus, i64) {
        if exit == entry {
            return if self.refund_ties {
                (WagerStatus::Draw, stake)
            } else {
                (WagerStatus::Lost, 0)
            };
        }

        let won = match direction {
            Direction::Up => exit > entry,
            Direction::Down => exit < entry,
        };

        if won {
            (WagerStatus::Won, self.win_payout(stake))
        } else {
            (WagerStatus::Lost, 0)
        }
    }

    /// Points credited for a winning stake.
    pub fn win_payout(&self, stake: i64) -> i64 {
        stake * self.win_multiplier_pct / 100 + self.win_bonus
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rules() -> OutcomeRules {
        OutcomeRules {
            win_multiplier_pct: 150,
            win_bonus: 0,
            refund_ties: false,
        }
    }

    #[test]
    fn test_up_wins_on_rise() {
        let (status, payout) = rules().judge(Direction::Up, 100, dec!(50000), dec!(51000));
        assert_eq!(status, WagerStatus::Won);
        assert_eq!(payout, 150);
    }

    #[test]
    fn test_up_loses_on_fall() {
        let (status, payout) = rules().judge(Direction::Up, 100, dec!(50000), dec!(49000));
        assert_eq!(status, WagerStatus::Lost);
        assert_eq!(payout, 0);
    }

    #[test]
    fn test_down_wins_on_fall() {
        let (status, payout) = rules().judge(Direction::Down, 100, dec!(50000), dec!(49000));
        assert_eq!(status, WagerStatus::Won);
        assert_eq!(payout, 150);
    }

    #[test]
    fn test_down_loses_on_rise() {
        let (status, payout) = rules().judge(Direction::Down, 100, dec!(50000), dec!(51000));
        assert_eq!(status, WagerStatus::Lost);
        assert_eq!(payout, 0);
    }

    #[test]
    fn test_tie_is_a_loss_by_default() {
        for direction in [Direction::Up, Direction::Down] {
            let (status, payout) = rules().judge(direction, 100, dec!(50000), dec!(50000));
            assert_eq!(status, WagerStatus::Lost);
            assert_eq!(payout, 0);
        }
    }

    #[test]
    fn test_tie_refund_when_configured() {
        let rules = OutcomeRules {
            refund_ties: true,
            ..rules()
        };
        let (status, payout) = rules.judge(Direction::Up, 100, dec!(50000), dec!(50000));
        assert_eq!(status, WagerStatus::Draw);
        assert_eq!(payout, 100);
    }

    #[test]
    fn test_tiny_move_still_decides() {
        let (status, _) = rules().judge(Direction::Up, 100, dec!(50000.00), dec!(50000.01));
        assert_eq!(status, WagerStatus::Won);
    }

    #[test]
    fn test_win_payout_integer_division() {
        // 15 * 150 / 100 floors to 22.
        assert_eq!(rules().win_payout(15), 22);
    }

    #[test]
    fn test_win_payout_with_bonus() {
        let rules = OutcomeRules {
            win_multiplier_pct: 100,
            win_bonus: 25,
            refund_ties: false,
        };
        assert_eq!(rules.win_payout(100), 125);
    }
}
