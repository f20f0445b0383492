//! Service fee calculator.
//!
//! Pure and deterministic: the conversion rate is captured once by the
//! caller and passed in, never re-queried mid-calculation.

use bigdecimal::{BigDecimal, ToPrimitive};

use crate::error::LedgerError;

pub const DEFAULT_FEE_PERCENT: f64 = 20.0;

/// Fee configuration consumed from the outside (read-only input).
#[derive(Debug, Clone, Copy)]
pub struct FeePolicy {
    pub default_percent: f64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            default_percent: DEFAULT_FEE_PERCENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeeQuote {
    /// Balance units to charge, rounded and floored at zero.
    pub charged_units: i64,
    /// Percent actually applied (override or default).
    pub applied_percent: f64,
    /// Full converted amount before the percentage is taken.
    pub total_units: BigDecimal,
}

impl FeePolicy {
    /// Converts a fiat amount into charged balance units.
    ///
    /// When the owner carries a minimum-amount threshold and the fiat amount
    /// falls below it, the default percent applies instead of the owner's
    /// override: below-threshold amounts do not benefit from a preferential
    /// rate.
    pub fn quote(
        &self,
        fiat_amount: &BigDecimal,
        fee_percent: f64,
        fee_min_fiat_threshold: &BigDecimal,
        rate: f64,
    ) -> Result<FeeQuote, LedgerError> {
        let zero = BigDecimal::from(0);
        if fiat_amount <= &zero {
            return Err(LedgerError::Validation(
                "fiat amount must be positive".into(),
            ));
        }
        if rate <= 0.0 {
            return Err(LedgerError::Validation(
                "conversion rate must be positive".into(),
            ));
        }

        let rate = BigDecimal::try_from(rate)
            .map_err(|_| LedgerError::Validation("conversion rate is not a number".into()))?;
        let total_units = fiat_amount / &rate;

        let below_threshold = fee_min_fiat_threshold > &zero && fiat_amount < fee_min_fiat_threshold;
        let applied_percent = if below_threshold {
            self.default_percent
        } else {
            fee_percent
        };

        let percent = BigDecimal::try_from(applied_percent)
            .map_err(|_| LedgerError::Validation("fee percent is not a number".into()))?;
        let charged = (&total_units * &percent / BigDecimal::from(100)).round(0);
        let charged_units = charged.to_i64().unwrap_or(0).max(0);

        Ok(FeeQuote {
            charged_units,
            applied_percent,
            total_units,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(v: i64) -> BigDecimal {
        BigDecimal::from(v)
    }

    #[test]
    fn rounds_the_charged_units() {
        let policy = FeePolicy::default();
        let quote = policy
            .quote(&dec(500_000), 20.0, &dec(0), 1450.0)
            .unwrap();
        // 500_000 / 1450 = 344.827..., 20% = 68.965... -> 69
        assert_eq!(quote.charged_units, 69);
        assert_eq!(quote.applied_percent, 20.0);
        let total = quote.total_units.to_f64().unwrap();
        assert!((total - 344.83).abs() < 0.01);
    }

    #[test]
    fn below_threshold_reverts_to_default_percent() {
        let policy = FeePolicy::default();
        let quote = policy
            .quote(&dec(50_000), 10.0, &dec(100_000), 1450.0)
            .unwrap();
        assert_eq!(quote.applied_percent, DEFAULT_FEE_PERCENT);
    }

    #[test]
    fn at_or_above_threshold_keeps_the_override() {
        let policy = FeePolicy::default();
        let quote = policy
            .quote(&dec(100_000), 10.0, &dec(100_000), 1450.0)
            .unwrap();
        assert_eq!(quote.applied_percent, 10.0);
    }

    #[test]
    fn zero_threshold_never_overrides() {
        let policy = FeePolicy::default();
        let quote = policy.quote(&dec(10), 5.0, &dec(0), 1450.0).unwrap();
        assert_eq!(quote.applied_percent, 5.0);
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let policy = FeePolicy::default();
        assert!(policy.quote(&dec(0), 20.0, &dec(0), 1450.0).is_err());
        assert!(policy.quote(&dec(-5), 20.0, &dec(0), 1450.0).is_err());
    }

    #[test]
    fn zero_percent_charges_nothing() {
        let policy = FeePolicy::default();
        let quote = policy.quote(&dec(500_000), 0.0, &dec(0), 1450.0).unwrap();
        assert_eq!(quote.charged_units, 0);
    }
}
