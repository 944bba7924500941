//! Unit test modules.

mod aggregator_test;
mod flag_decoder_test;
mod session_store_test;
mod tcx_export_test;
