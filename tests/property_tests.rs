// Property-based tests for configuration parsing using proptest

use proptest::prelude::*;
use serde_json::json;
use telemedicine_backend::config::CorsConfig;

proptest! {
    // Joining any comma-free tokens with ", " and parsing back yields the
    // original tokens (split + trim round-trip).
    #[test]
    fn comma_joined_origins_round_trip(tokens in proptest::collection::vec("[a-z0-9./:-]{1,20}", 1..6)) {
        let joined = tokens.join(", ");
        let cors: CorsConfig =
            serde_json::from_value(json!({ "allowed_origins": joined })).unwrap();
        prop_assert_eq!(cors.allowed_origins, tokens);
    }

    // A literal list deserializes unchanged, whatever it contains.
    #[test]
    fn literal_origin_lists_are_identity(tokens in proptest::collection::vec(".{0,30}", 0..6)) {
        let cors: CorsConfig =
            serde_json::from_value(json!({ "allowed_origins": tokens.clone() })).unwrap();
        prop_assert_eq!(cors.allowed_origins, tokens);
    }

    // Numbers are never a valid origins value.
    #[test]
    fn numeric_origins_are_rejected(n in any::<i64>()) {
        let result = serde_json::from_value::<CorsConfig>(json!({ "allowed_origins": n }));
        prop_assert!(result.is_err());
    }
}
