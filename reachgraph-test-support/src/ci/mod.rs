//! Environment-driven knobs shared by the CI jobs that run the test suites.

pub mod property_test_profile;
