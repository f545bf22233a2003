//! Consolidated end-to-end tests.
