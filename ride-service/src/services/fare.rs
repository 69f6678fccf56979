//! Fare calculation.
//!
//! Pure and deterministic: tariffs are injected from configuration and the
//! calculator performs no I/O and never fails. Distance validation is the
//! caller's job.

use crate::config::TariffConfig;
use rust_decimal::Decimal;

/// The three-way split of a fare between rider charge, platform commission,
/// and driver earnings. `commission + driver_amount == fare` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FareBreakdown {
    pub fare: Decimal,
    pub commission: Decimal,
    pub driver_amount: Decimal,
}

#[derive(Clone)]
pub struct FareCalculator {
    base_fare: Decimal,
    price_per_km: Decimal,
    commission_pct: Decimal,
}

impl FareCalculator {
    pub fn new(tariff: &TariffConfig) -> Self {
        Self {
            base_fare: tariff.base_fare,
            price_per_km: tariff.price_per_km,
            commission_pct: tariff.commission_pct,
        }
    }

    /// `fare = base_fare + price_per_km * distance_km`, rounded to 2 dp.
    pub fn fare(&self, distance_km: Decimal) -> Decimal {
        (self.base_fare + self.price_per_km * distance_km).round_dp(2)
    }

    /// Platform share of a fare, rounded to 2 dp.
    pub fn commission(&self, fare: Decimal) -> Decimal {
        (fare * self.commission_pct / Decimal::from(100)).round_dp(2)
    }

    /// Full breakdown for a trip distance. The driver amount is derived as
    /// the remainder so the split conserves the fare exactly.
    pub fn quote(&self, distance_km: Decimal) -> FareBreakdown {
        let fare = self.fare(distance_km);
        let commission = self.commission(fare);
        FareBreakdown {
            fare,
            commission,
            driver_amount: fare - commission,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    fn naira_tariff() -> TariffConfig {
        TariffConfig {
            base_fare: Decimal::from(200),
            price_per_km: Decimal::from(100),
            commission_pct: Decimal::from(10),
        }
    }

    #[test]
    fn canonical_scenario() {
        // base 200, 100/km, 10% commission, 10 km
        let calc = FareCalculator::new(&naira_tariff());
        let quote = calc.quote(Decimal::from(10));

        assert_eq!(quote.fare, Decimal::from(1200));
        assert_eq!(quote.commission, Decimal::from(120));
        assert_eq!(quote.driver_amount, Decimal::from(1080));
    }

    #[test]
    fn zero_distance_charges_base_fare() {
        let calc = FareCalculator::new(&naira_tariff());
        assert_eq!(calc.fare(Decimal::ZERO), Decimal::from(200));
    }

    #[test]
    fn split_conserves_fare_exactly() {
        let calc = FareCalculator::new(&naira_tariff());

        for d in [0.1_f64, 0.33, 1.0, 2.5, 7.77, 12.345, 100.0] {
            let distance = Decimal::from_f64(d).unwrap();
            let quote = calc.quote(distance);
            assert_eq!(
                quote.commission + quote.driver_amount,
                quote.fare,
                "split must conserve the fare for distance {}",
                d
            );
        }
    }

    #[test]
    fn arbitrary_tariff_is_respected() {
        let calc = FareCalculator::new(&TariffConfig {
            base_fare: Decimal::from(50),
            price_per_km: Decimal::new(275, 1), // 27.5
            commission_pct: Decimal::from(15),
        });

        let quote = calc.quote(Decimal::from(4));
        assert_eq!(quote.fare, Decimal::from(160));
        assert_eq!(quote.commission, Decimal::from(24));
        assert_eq!(quote.driver_amount, Decimal::from(136));
    }
}
