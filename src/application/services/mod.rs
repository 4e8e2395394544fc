pub mod funding_platform;
