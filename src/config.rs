use clap::{Parser, ValueEnum};

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "notes-api")]
#[command(about = "REST API for short text notes with admission control")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 5001)]
    pub port: u16,

    // Rate limit max requests per window
    #[arg(long, default_value_t = 100)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 60)]
    pub rate_window: u64,

    // Budget scope: one budget per client address, or a single shared budget
    #[arg(long, value_enum, default_value_t = RateScope::Ip)]
    pub rate_scope: RateScope,

    // Admit requests when the budget store is unreachable (default is to deny)
    #[arg(long, default_value_t = false)]
    pub fail_open: bool,

    // Remote budget store base URL; budgets are kept in memory when unset
    #[arg(long)]
    pub budget_store_url: Option<String>,

    // Bearer token for the remote budget store
    #[arg(long)]
    pub budget_store_token: Option<String>,

    // Remote budget store request timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub budget_store_timeout_ms: u64,

    // Directory holding the bundled browser client
    #[arg(long, default_value = "frontend/dist")]
    pub static_dir: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateScope {
    // One budget per client address
    Ip,
    // Every caller draws from the same budget
    Global,
}

// Policy for admission when the budget store itself is down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPolicy {
    Open,
    Closed,
}

impl Args {
    pub fn fail_policy(&self) -> FailPolicy {
        if self.fail_open {
            FailPolicy::Open
        } else {
            FailPolicy::Closed
        }
    }
}
