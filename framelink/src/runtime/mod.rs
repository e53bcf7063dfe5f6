pub mod capture;
pub mod command_queue;
pub mod dispatcher;
pub mod log_buffer;
pub mod routes;
pub mod settings;
pub mod web_api;
pub mod web_server;
