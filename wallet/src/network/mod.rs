pub mod explorer;
pub mod registry;

pub use explorer::{explorer_url, DEFAULT_EXPLORER_HOST};
pub use registry::{
    builtin_networks, BatchGuard, CustomRpc, NetworkProfile, NetworkRegistry, CUSTOM_RPCS_KEY,
    DEVNET, MAINNET_BETA, SELECTED_NETWORK_KEY, TESTNET,
};
