pub mod asaas_client;
pub mod mock_gateway;
pub mod unconfigured_gateway;
