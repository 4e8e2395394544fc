pub mod reporting_handler;
