//! Fee estimation.
//!
//! Pure functions over a venue's fee schedule. No I/O.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of fee being estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    /// Maker/taker fee on a crypto trade
    CryptocurrencyTrade,
    /// Flat withdrawal fee for a currency
    CryptocurrencyWithdrawal,
}

/// Inputs for a fee estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRequest {
    /// Kind of fee
    pub fee_type: FeeType,
    /// Currency the fee relates to (withdrawals)
    pub currency: String,
    /// Trade price
    pub purchase_price: Decimal,
    /// Trade amount
    pub amount: Decimal,
    /// Whether the order adds liquidity
    pub is_maker: bool,
}

impl FeeRequest {
    /// Trade fee request.
    pub fn trade(purchase_price: Decimal, amount: Decimal, is_maker: bool) -> Self {
        Self {
            fee_type: FeeType::CryptocurrencyTrade,
            currency: String::new(),
            purchase_price,
            amount,
            is_maker,
        }
    }

    /// Withdrawal fee request.
    pub fn withdrawal(currency: impl Into<String>) -> Self {
        Self {
            fee_type: FeeType::CryptocurrencyWithdrawal,
            currency: currency.into(),
            purchase_price: Decimal::ZERO,
            amount: Decimal::ZERO,
            is_maker: false,
        }
    }
}

/// A venue's maker/taker rates and withdrawal fee table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Maker rate as a fraction (0.001 = 0.1%)
    pub maker_rate: Decimal,
    /// Taker rate as a fraction
    pub taker_rate: Decimal,
    /// Flat withdrawal fee per currency code
    pub withdrawal: HashMap<String, Decimal>,
}

impl FeeSchedule {
    /// Schedule with an empty withdrawal table.
    pub fn new(maker_rate: Decimal, taker_rate: Decimal) -> Self {
        Self {
            maker_rate,
            taker_rate,
            withdrawal: HashMap::new(),
        }
    }

    /// Add a withdrawal fee entry.
    pub fn with_withdrawal_fee(mut self, currency: &str, fee: Decimal) -> Self {
        self.withdrawal.insert(currency.to_ascii_uppercase(), fee);
        self
    }

    /// Withdrawal fee for `currency`; zero when not listed.
    pub fn withdrawal_fee(&self, currency: &str) -> Decimal {
        self.withdrawal
            .get(&currency.to_ascii_uppercase())
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

/// Estimate a fee. Never negative.
///
/// Trade fee = rate × price × amount, rate chosen by `is_maker`. A product
/// past the `Decimal` range saturates to `Decimal::MAX`.
pub fn estimate_fee(schedule: &FeeSchedule, request: &FeeRequest) -> Decimal {
    let fee = match request.fee_type {
        FeeType::CryptocurrencyTrade => {
            let rate = if request.is_maker {
                schedule.maker_rate
            } else {
                schedule.taker_rate
            };
            rate.checked_mul(request.purchase_price)
                .and_then(|notional_rate| notional_rate.checked_mul(request.amount))
                .unwrap_or_else(|| saturated(rate, request.purchase_price, request.amount))
        }
        FeeType::CryptocurrencyWithdrawal => schedule.withdrawal_fee(&request.currency),
    };

    fee.max(Decimal::ZERO)
}

/// Overflow bound carrying the sign of the exact product.
fn saturated(rate: Decimal, price: Decimal, amount: Decimal) -> Decimal {
    let negatives = [rate, price, amount]
        .iter()
        .filter(|value| value.is_sign_negative())
        .count();
    if negatives % 2 == 0 {
        Decimal::MAX
    } else {
        Decimal::MIN
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn schedule() -> FeeSchedule {
        FeeSchedule::new(dec!(0.001), dec!(0.0025)).with_withdrawal_fee("btc", dec!(0.001))
    }

    #[test]
    fn test_maker_and_taker_rates() {
        let schedule = schedule();

        assert_eq!(
            estimate_fee(&schedule, &FeeRequest::trade(dec!(100), dec!(2), true)),
            dec!(0.2)
        );
        assert_eq!(
            estimate_fee(&schedule, &FeeRequest::trade(dec!(100), dec!(2), false)),
            dec!(0.5)
        );
    }

    #[test]
    fn test_withdrawal_table_lookup() {
        let schedule = schedule();

        assert_eq!(estimate_fee(&schedule, &FeeRequest::withdrawal("BTC")), dec!(0.001));
        assert_eq!(estimate_fee(&schedule, &FeeRequest::withdrawal("DOGE")), Decimal::ZERO);
    }

    #[test]
    fn test_negative_amount_floors_at_zero() {
        let fee = estimate_fee(&schedule(), &FeeRequest::trade(dec!(100), dec!(-5), false));
        assert_eq!(fee, Decimal::ZERO);
    }

    #[test]
    fn test_negative_table_entry_floors_at_zero() {
        let schedule = FeeSchedule::new(dec!(0.001), dec!(0.002)).with_withdrawal_fee("ETH", dec!(-1));
        assert_eq!(estimate_fee(&schedule, &FeeRequest::withdrawal("ETH")), Decimal::ZERO);
    }

    #[test]
    fn test_overflowing_notional_saturates() {
        let schedule = FeeSchedule::new(dec!(0.001), dec!(0.0025));

        let fee = estimate_fee(&schedule, &FeeRequest::trade(Decimal::MAX, Decimal::MAX, false));
        assert_eq!(fee, Decimal::MAX);

        let fee = estimate_fee(&schedule, &FeeRequest::trade(Decimal::MAX, Decimal::MIN, true));
        assert_eq!(fee, Decimal::ZERO);
    }

    fn any_decimal() -> impl Strategy<Value = Decimal> {
        (any::<i64>(), any::<i32>(), 0u32..=28).prop_map(|(lo, hi, scale)| {
            Decimal::from_parts(lo as u32, (lo >> 32) as u32, hi as u32, hi < 0, scale)
        })
    }

    proptest! {
        #[test]
        fn prop_trade_fee_is_never_negative(
            price in any_decimal(),
            amount in any_decimal(),
            is_maker in any::<bool>(),
        ) {
            let request = FeeRequest::trade(price, amount, is_maker);
            prop_assert!(estimate_fee(&schedule(), &request) >= Decimal::ZERO);
        }

        #[test]
        fn prop_trade_fee_is_exact_for_small_inputs(
            price in 0i64..1_000_000,
            amount in 0i64..1_000_000,
            scale in 0u32..8,
        ) {
            let price = Decimal::new(price, scale);
            let amount = Decimal::new(amount, scale);
            let fee = estimate_fee(&schedule(), &FeeRequest::trade(price, amount, false));
            prop_assert_eq!(fee, dec!(0.0025) * price * amount);
        }
    }
}
