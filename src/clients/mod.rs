pub mod workiq_client;
