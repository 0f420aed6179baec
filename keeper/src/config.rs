//! Keeper configuration

use anyhow::{Context, Result};
use farm_engine::{token_vec, Address, PoolConfig, RewardRound};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tick interval in seconds
    pub poll_interval_secs: u64,

    /// Delay before an unacknowledged transfer is submitted again
    pub transfer_retry_secs: u64,

    /// Maximum transfers (new and retried) submitted per tick
    pub max_transfers_per_tick: usize,

    /// Where pool state is snapshotted
    pub snapshot_path: String,

    /// Run the invariant audit every N ticks (0 disables)
    pub audit_every_ticks: u64,

    /// Pools hosted by this keeper
    pub pools: Vec<PoolSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSpec {
    pub name: String,
    pub owner: Address,
    /// Account whose deposit notifications and acknowledgements are trusted
    pub ledger_account: Address,
    pub reward_tokens: usize,
    pub vesting_period: u64,
    /// Out of 1000
    pub vesting_ratio: u32,
    pub withdraw_all_lock_period: u64,
    pub reward_rounds: Vec<RoundSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSpec {
    pub start_time: u64,
    pub reward_per_second: Vec<u64>,
}

impl PoolSpec {
    /// Engine construction parameters for this pool
    pub fn to_pool_config(&self) -> Result<PoolConfig> {
        let mut reward_rounds = Vec::with_capacity(self.reward_rounds.len());
        for round in &self.reward_rounds {
            let rates: Vec<u128> = round.reward_per_second.iter().map(|r| u128::from(*r)).collect();
            let rates = token_vec(&rates, self.reward_tokens)
                .context(format!("Bad reward round in pool {}", self.name))?;
            reward_rounds.push(RewardRound::new(round.start_time, rates));
        }
        Ok(PoolConfig {
            owner: self.owner,
            ledger_account: self.ledger_account,
            reward_rounds,
            reward_token_count: self.reward_tokens,
            vesting_period: self.vesting_period,
            vesting_ratio: self.vesting_ratio,
            withdraw_all_lock_period: self.withdraw_all_lock_period,
        })
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FARM_KEEPER_CONFIG")
            .unwrap_or_else(|_| "farm-keeper.toml".to_string());
        let expanded = shellexpand::tilde(&config_path);

        let config_str = std::fs::read_to_string(expanded.as_ref())
            .context(format!("Failed to read config file: {}", config_path))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config TOML")?;

        Ok(config)
    }

    /// Single demo pool with two reward tokens and half vesting
    pub fn default_local() -> Self {
        Self {
            poll_interval_secs: 1,
            transfer_retry_secs: 30,
            max_transfers_per_tick: 64,
            snapshot_path: "~/.farm-keeper/state.bin".to_string(),
            audit_every_ticks: 60,
            pools: vec![PoolSpec {
                name: "demo".to_string(),
                owner: Address::new([1; 32]),
                ledger_account: Address::new([9; 32]),
                reward_tokens: 2,
                vesting_period: 86_400,
                vesting_ratio: 500,
                withdraw_all_lock_period: 604_800,
                reward_rounds: vec![RoundSpec {
                    start_time: 0,
                    reward_per_second: vec![1_000, 500],
                }],
            }],
        }
    }

    /// Snapshot path with `~` expanded
    pub fn snapshot_path(&self) -> String {
        shellexpand::tilde(&self.snapshot_path).into_owned()
    }

    /// Write default config to file
    pub fn write_default(path: &str) -> Result<()> {
        let config = Self::default_local();
        let toml_str = toml::to_string_pretty(&config)
            .context("Failed to serialize config")?;

        std::fs::write(path, toml_str)
            .context(format!("Failed to write config to {}", path))?;

        log::info!("Created default config at {}", path);
        Ok(())
    }
}
