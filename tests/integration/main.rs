//! Integration tests for the `mergebench` binary.

mod cli;
