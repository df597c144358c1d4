pub mod approval;
pub mod purchase_order;
pub mod purchase_request;
pub mod receipt;
pub mod request_item;

/// Serializers for monetary columns. The sqlite backend drops trailing
/// zeros on round-trip (a stored 95.00 comes back as 95), so every
/// monetary field is emitted with a fixed two-decimal scale.
pub mod money {
    use rust_decimal::Decimal;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:.2}", value.round_dp(2)))
    }

    pub fn serialize_opt<S: Serializer>(
        value: &Option<Decimal>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serialize(v, serializer),
            None => serializer.serialize_none(),
        }
    }

    #[cfg(test)]
    mod tests {
        use rust_decimal_macros::dec;
        use serde::Serialize;

        #[derive(Serialize)]
        struct Line {
            #[serde(serialize_with = "super::serialize")]
            amount: rust_decimal::Decimal,
        }

        #[test]
        fn amounts_keep_two_decimals() {
            let json = |d| serde_json::to_value(Line { amount: d }).unwrap();
            assert_eq!(json(dec!(95)), serde_json::json!({"amount": "95.00"}));
            assert_eq!(json(dec!(95.5)), serde_json::json!({"amount": "95.50"}));
            assert_eq!(json(dec!(120.00)), serde_json::json!({"amount": "120.00"}));
        }
    }
}
