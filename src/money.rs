//! Monetary arithmetic for line items.
//!
//! All monetary amounts are `rust_decimal::Decimal` values carried at two
//! fractional digits of currency precision. The subtotal calculator here is
//! the only place quantity/price validation happens, so every caller gets
//! the same rejection behavior before any write is attempted.

use rust_decimal::Decimal;
use serde::Serializer;

use crate::errors::ServiceError;

/// Currency scale used throughout the API.
pub const CURRENCY_SCALE: u32 = 2;

/// Rounds an amount to currency precision and pins its scale so it
/// serializes with exactly two fractional digits ("40.00", never "40").
pub fn round_currency(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp(CURRENCY_SCALE);
    rounded.rescale(CURRENCY_SCALE);
    rounded
}

/// Serde serializer for monetary fields.
///
/// SQLite round-trips decimals through floating point and drops trailing
/// zeros, so entity models pin the scale here instead of trusting whatever
/// the driver hands back.
pub fn serialize_money<S>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&round_currency(*amount).to_string())
}

/// Computes a line item subtotal as `quantity * unit_price` at currency
/// precision.
///
/// Pure function; it never inspects or mutates the parent aggregate.
/// Non-positive quantities and unit prices are rejected with
/// `ServiceError::InvalidInput` before the caller performs any write.
pub fn line_subtotal(quantity: i32, unit_price: Decimal) -> Result<Decimal, ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::InvalidInput(format!(
            "Quantity must be a positive integer, got {}",
            quantity
        )));
    }
    if unit_price <= Decimal::ZERO {
        return Err(ServiceError::InvalidInput(format!(
            "Unit price must be positive, got {}",
            unit_price
        )));
    }

    Ok(round_currency(Decimal::from(quantity) * unit_price))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    #[test]
    fn subtotal_is_quantity_times_unit_price() {
        assert_eq!(line_subtotal(3, dec!(10.00)).unwrap(), dec!(30.00));
        assert_eq!(line_subtotal(2, dec!(5.00)).unwrap(), dec!(10.00));
        assert_eq!(line_subtotal(5, dec!(10.00)).unwrap(), dec!(50.00));
        assert_eq!(line_subtotal(1, dec!(0.01)).unwrap(), dec!(0.01));
    }

    #[test]
    fn subtotal_rounds_to_currency_precision() {
        assert_eq!(line_subtotal(3, dec!(19.999)).unwrap(), dec!(60.00));
        assert_eq!(line_subtotal(7, dec!(0.333)).unwrap(), dec!(2.33));
    }

    #[test]
    fn subtotal_serializes_with_two_fractional_digits() {
        let subtotal = line_subtotal(4, dec!(10)).unwrap();
        assert_eq!(subtotal.scale(), CURRENCY_SCALE);
        assert_eq!(subtotal.to_string(), "40.00");
    }

    #[test_case(0, dec!(10.00) ; "zero quantity")]
    #[test_case(-3, dec!(10.00) ; "negative quantity")]
    #[test_case(2, dec!(0.00) ; "zero unit price")]
    #[test_case(2, dec!(-1) ; "negative unit price")]
    fn rejects_non_positive_inputs(quantity: i32, unit_price: Decimal) {
        assert_matches!(
            line_subtotal(quantity, unit_price),
            Err(ServiceError::InvalidInput(_))
        );
    }

    #[test]
    fn round_currency_pins_scale() {
        assert_eq!(round_currency(dec!(40)).to_string(), "40.00");
        assert_eq!(round_currency(dec!(1.005)).to_string(), "1.00");
        assert_eq!(round_currency(dec!(1.015)).to_string(), "1.02");
    }

    #[test]
    fn money_fields_serialize_with_pinned_scale() {
        #[derive(serde::Serialize)]
        struct Wrapper {
            #[serde(serialize_with = "serialize_money")]
            total: Decimal,
        }

        let json = serde_json::to_string(&Wrapper { total: dec!(30) }).unwrap();
        assert_eq!(json, r#"{"total":"30.00"}"#);

        let json = serde_json::to_string(&Wrapper { total: dec!(12.5) }).unwrap();
        assert_eq!(json, r#"{"total":"12.50"}"#);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(1000))]

            #[test]
            fn subtotal_matches_exact_product(
                quantity in 1i32..=10_000,
                unit_price_cents in 1i64..=1_000_000i64,
            ) {
                let unit_price = Decimal::new(unit_price_cents, 2);
                let subtotal = line_subtotal(quantity, unit_price).unwrap();
                let expected = Decimal::from(quantity) * unit_price;
                prop_assert_eq!(subtotal, expected);
                prop_assert_eq!(subtotal.scale(), CURRENCY_SCALE);
            }

            #[test]
            fn subtotal_is_positive_for_valid_inputs(
                quantity in 1i32..=10_000,
                unit_price_cents in 1i64..=1_000_000i64,
            ) {
                let unit_price = Decimal::new(unit_price_cents, 2);
                let subtotal = line_subtotal(quantity, unit_price).unwrap();
                prop_assert!(subtotal > Decimal::ZERO);
            }

            #[test]
            fn non_positive_quantity_never_produces_a_subtotal(
                quantity in -10_000i32..=0,
                unit_price_cents in 1i64..=1_000_000i64,
            ) {
                let unit_price = Decimal::new(unit_price_cents, 2);
                prop_assert!(line_subtotal(quantity, unit_price).is_err());
            }
        }
    }
}
