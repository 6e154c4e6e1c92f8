/// Integration tests for loading a complete data directory.

mod dataset;
mod helpers;
