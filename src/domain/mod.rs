pub mod props;
pub mod transfer;
pub mod wallet;
