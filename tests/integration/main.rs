//! Integration tests for the crawl engine
//!
//! Static-mode scenarios run against wiremock servers; cancellation uses an
//! in-process fetch strategy; rendered-mode scenarios need a local Chromium
//! and are ignored by default.

mod crawl_tests;
mod rendered_tests;
