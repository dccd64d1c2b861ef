pub mod paths;

pub use paths::WalletPaths;
