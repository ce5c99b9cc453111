pub mod auth_client;
