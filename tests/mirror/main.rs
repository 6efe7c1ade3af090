// Integration tests for the mirroring engine
// Engine, logger and comparator tests organized here

mod engine_tests;
