pub mod market;
pub mod pool;

pub use market::{resolve_pool_keys, TrackedPoolKeys};
pub use pool::{
    decode_pool, DecodedPool, UserSwapAccounts, MARKET_PROGRAM_ID_OFFSET, OPENBOOK_PROGRAM_ID,
    POOL_STATE_SIZE, RAYDIUM_AMM_V4_PROGRAM_ID,
};
