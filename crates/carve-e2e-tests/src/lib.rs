//! End-to-end tests for carve live in `tests/`.
