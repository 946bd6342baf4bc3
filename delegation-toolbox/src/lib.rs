pub mod config;
pub mod output;
pub mod rpc;
pub mod staking_api;

pub use config::NetworksConfig;
pub use rpc::RpcBatchCaller;
pub use staking_api::StakingApi;
