//! Property tests for address normalization

use proptest::prelude::*;
use routeplan_maps::normalize_address;

proptest! {
    #[test]
    fn surrounding_whitespace_and_case_never_change_the_key(
        core in "[A-Za-z0-9][A-Za-z0-9 ,.-]{0,40}[A-Za-z0-9]",
        left in "[ \t]{0,5}",
        right in "[ \t]{0,5}",
    ) {
        let padded = format!("{left}{core}{right}");
        prop_assert_eq!(normalize_address(&padded), normalize_address(&core.to_uppercase()));
    }

    #[test]
    fn normalization_is_idempotent(input in "[ -~]{0,60}") {
        let once = normalize_address(&input);
        prop_assert_eq!(normalize_address(&once), once.clone());
    }
}
