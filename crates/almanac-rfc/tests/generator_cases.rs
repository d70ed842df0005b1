//! Expansion of well-known recurrence patterns through the default generator.

mod generator_cases_data;

use generator_cases_data::{assert_case, generator_cases};

#[test_log::test]
fn generator_cases_expand_as_expected() {
    for case in generator_cases() {
        assert_case(&case);
    }
}
